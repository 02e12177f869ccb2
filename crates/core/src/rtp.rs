//! RTP fixed header parsing (RFC 3550 section 5.1).
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |V=2|P|X|  CC   |M|     PT      |       Sequence Number        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                           Timestamp                           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                             SSRC                              |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! This module is read-only: it validates and extracts header fields from
//! a UDP payload believed to carry RTP, trimming CSRC list, extension
//! header, and padding before handing back the media payload.

use std::time::SystemTime;

use thiserror::Error;

const FIXED_HEADER_LEN: usize = 12;
const RTP_VERSION: u8 = 2;

/// Failure kinds for [`RtpPacket::parse`].
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum RtpParseError {
    #[error("short RTP header: {0} bytes, need at least 12")]
    ShortHeader(usize),
    #[error("unsupported RTP version: {0}")]
    WrongVersion(u8),
    #[error("short CSRC list: need {need} more bytes, have {have}")]
    ShortCsrc { need: usize, have: usize },
    #[error("short extension header: need 4 more bytes, have {have}")]
    ShortExtensionHeader { have: usize },
    #[error("short extension body: need {need} more bytes, have {have}")]
    ShortExtensionBody { need: usize, have: usize },
    #[error("invalid padding length: {0}")]
    InvalidPadding(u8),
    #[error("empty payload after trimming")]
    EmptyPayload,
}

/// An immutable, fully-parsed RTP packet.
#[derive(Debug, Clone)]
pub struct RtpPacket {
    pub received_at: SystemTime,
    pub version: u8,
    pub padding: bool,
    pub extension: bool,
    pub marker: bool,
    pub cc: u8,
    pub payload_type: u8,
    pub sequence_number: u16,
    pub timestamp: u32,
    pub ssrc: u32,
    pub csrc: Vec<u32>,
    pub extension_header_id: Option<u16>,
    pub extension_header_length: Option<u16>,
    pub extension_header: Option<Vec<u8>>,
    /// Payload bytes with padding already stripped.
    pub payload: Vec<u8>,
    /// Original on-wire bytes (header + payload, including padding), kept
    /// for replay.
    pub raw: Vec<u8>,
}

impl RtpPacket {
    /// Parse a UDP payload as an RTP packet.
    pub fn parse(data: &[u8], received_at: SystemTime) -> Result<Self, RtpParseError> {
        if data.len() < FIXED_HEADER_LEN {
            return Err(RtpParseError::ShortHeader(data.len()));
        }

        let version = (data[0] >> 6) & 0b11;
        if version != RTP_VERSION {
            return Err(RtpParseError::WrongVersion(version));
        }

        let padding = data[0] & 0x20 != 0;
        let extension = data[0] & 0x10 != 0;
        let cc = data[0] & 0x0F;
        let marker = data[1] & 0x80 != 0;
        let payload_type = data[1] & 0x7F;
        let sequence_number = u16::from_be_bytes([data[2], data[3]]);
        let timestamp = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        let ssrc = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);

        let mut offset = FIXED_HEADER_LEN;

        let mut csrc = Vec::with_capacity(cc as usize);
        if cc > 0 {
            let need = cc as usize * 4;
            let have = data.len() - offset;
            if have < need {
                return Err(RtpParseError::ShortCsrc { need, have });
            }
            for i in 0..cc as usize {
                let base = offset + i * 4;
                csrc.push(u32::from_be_bytes([
                    data[base],
                    data[base + 1],
                    data[base + 2],
                    data[base + 3],
                ]));
            }
            offset += need;
        }

        let mut extension_header_id = None;
        let mut extension_header_length = None;
        let mut extension_header = None;
        if extension {
            let have = data.len() - offset;
            if have < 4 {
                return Err(RtpParseError::ShortExtensionHeader { have });
            }
            let id = u16::from_be_bytes([data[offset], data[offset + 1]]);
            let len_words = u16::from_be_bytes([data[offset + 2], data[offset + 3]]);
            offset += 4;

            let need = len_words as usize * 4;
            let have = data.len() - offset;
            if have < need {
                return Err(RtpParseError::ShortExtensionBody { need, have });
            }
            extension_header_id = Some(id);
            extension_header_length = Some(len_words);
            extension_header = Some(data[offset..offset + need].to_vec());
            offset += need;
        }

        let payload_region = &data[offset..];
        let payload = if padding {
            let pad_len = *payload_region.last().ok_or(RtpParseError::EmptyPayload)?;
            if pad_len == 0 || pad_len as usize > payload_region.len() {
                return Err(RtpParseError::InvalidPadding(pad_len));
            }
            payload_region[..payload_region.len() - pad_len as usize].to_vec()
        } else {
            payload_region.to_vec()
        };

        if payload.is_empty() {
            return Err(RtpParseError::EmptyPayload);
        }

        Ok(RtpPacket {
            received_at,
            version,
            padding,
            extension,
            marker,
            cc,
            payload_type,
            sequence_number,
            timestamp,
            ssrc,
            csrc,
            extension_header_id,
            extension_header_length,
            extension_header,
            payload,
            raw: data.to_vec(),
        })
    }
}
