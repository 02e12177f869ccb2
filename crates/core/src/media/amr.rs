//! AMR depayloader: RTP AMR payloads (RFC 4867) to storage-format frames.
//!
//! Both packing modes are supported. Only the first TOC entry in a
//! payload is honored; a payload whose first TOC entry sets the "more
//! frames follow" bit is rejected.

use std::collections::HashMap;

use crate::error::{CoreError, Result};
use crate::rtp::RtpPacket;

use super::{CodecMetadata, CodecOption, Depayloader};

const NB_FRAME_SIZE: [usize; 16] = [12, 13, 15, 17, 19, 20, 26, 31, 5, 0, 0, 0, 0, 0, 0, 0];
const WB_FRAME_SIZE: [usize; 16] = [17, 23, 32, 36, 40, 46, 50, 58, 60, 5, 5, 0, 0, 0, 0, 0];

const NB_NO_DATA: u8 = 0x7C;
const WB_NO_DATA: u8 = 0xFC;

pub const METADATA: CodecMetadata = CodecMetadata {
    short_name: "amr",
    long_name: "Adaptive Multi-Rate audio (RFC 4867)",
    options: &[
        CodecOption {
            name: "sample-rate",
            required: true,
            restricted_values: Some(&[
                ("nb", "narrowband, 8000 Hz"),
                ("wb", "wideband, 16000 Hz"),
            ]),
        },
        CodecOption {
            name: "octet-aligned",
            required: true,
            restricted_values: Some(&[
                ("0", "bandwidth-efficient packing"),
                ("1", "octet-aligned packing"),
            ]),
        },
    ],
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Band {
    Nb,
    Wb,
}

pub struct AmrDepayloader {
    configured: bool,
    band: Band,
    octet_aligned: bool,
    last_sequence: Option<u16>,
    last_timestamp: Option<u32>,
}

impl AmrDepayloader {
    pub fn new() -> Self {
        AmrDepayloader {
            configured: false,
            band: Band::Nb,
            octet_aligned: false,
            last_sequence: None,
            last_timestamp: None,
        }
    }

    fn frame_table(&self) -> &'static [usize; 16] {
        match self.band {
            Band::Nb => &NB_FRAME_SIZE,
            Band::Wb => &WB_FRAME_SIZE,
        }
    }

    fn no_data_byte(&self) -> u8 {
        match self.band {
            Band::Nb => NB_NO_DATA,
            Band::Wb => WB_NO_DATA,
        }
    }

    fn period(&self) -> u32 {
        match self.band {
            Band::Nb => 160,
            Band::Wb => 320,
        }
    }

    fn gap_fill(&self, timestamp: u32) -> Vec<u8> {
        let Some(prev) = self.last_timestamp else {
            return Vec::new();
        };
        let period = self.period();
        let elapsed = timestamp.wrapping_sub(prev) as i64;
        let periods = elapsed / period as i64;
        if periods >= 2 {
            vec![self.no_data_byte(); (periods - 1) as usize]
        } else {
            Vec::new()
        }
    }

    fn decode_octet_aligned(&self, payload: &[u8]) -> Result<(u8, Vec<u8>)> {
        if payload.len() < 2 {
            return Err(CoreError::ShortPayload { need: 2, have: payload.len() });
        }
        let byte1 = payload[1];
        let f = (byte1 & 0x80) != 0;
        let ft = (byte1 >> 3) & 0x0F;
        let q = (byte1 & 0x04) != 0;
        if f {
            return Err(CoreError::MultiFrameUnsupported);
        }
        let size = self.frame_table()[ft as usize];
        let need = 2 + size;
        if payload.len() < need {
            return Err(CoreError::ShortPayload { need, have: payload.len() });
        }
        let storage_header = (ft << 3) | ((q as u8) << 2);
        let speech = payload[2..need].to_vec();
        Ok((storage_header, speech))
    }

    fn decode_bandwidth_efficient(&self, payload: &[u8]) -> Result<(u8, Vec<u8>)> {
        if payload.len() < 2 {
            return Err(CoreError::ShortPayload { need: 2, have: payload.len() });
        }
        let byte0 = payload[0];
        let byte1 = payload[1];
        let f = (byte0 & 0x08) != 0;
        let ft = ((byte0 & 0x07) << 1) | (byte1 >> 7);
        let q = (byte1 & 0x40) != 0;
        if f {
            return Err(CoreError::MultiFrameUnsupported);
        }
        let size = self.frame_table()[ft as usize];
        // `in` begins at payload byte 1.
        let input = &payload[1..];
        if input.is_empty() {
            return Err(CoreError::ShortPayload { need: size, have: 0 });
        }
        let mut speech = Vec::with_capacity(size);
        for k in 0..size {
            let cur = *input.get(k).ok_or(CoreError::ShortPayload { need: size, have: input.len() })?;
            let next = input.get(k + 1).copied().unwrap_or(0);
            let low_bits = if k + 1 < size { next >> 6 } else { 0 };
            speech.push(((cur & 0x3F) << 2) | low_bits);
        }
        let storage_header = ((byte0 & 0x07) << 4) | ((byte1 & 0x80) >> 4) | ((byte1 & 0x40) >> 4);
        let _ = q; // folded into storage_header above
        Ok((storage_header, speech))
    }
}

impl Default for AmrDepayloader {
    fn default() -> Self {
        Self::new()
    }
}

impl Depayloader for AmrDepayloader {
    fn configure(&mut self, options: &HashMap<String, String>) -> Result<()> {
        if self.configured {
            return Err(CoreError::CodecAlreadyConfigured);
        }
        self.band = match options.get("sample-rate").map(String::as_str) {
            Some("nb") => Band::Nb,
            Some("wb") => Band::Wb,
            _ => return Err(CoreError::CodecConfig("sample-rate must be 'nb' or 'wb'".into())),
        };
        self.octet_aligned = match options.get("octet-aligned").map(String::as_str) {
            Some("1") => true,
            Some("0") => false,
            _ => return Err(CoreError::CodecConfig("octet-aligned must be '0' or '1'".into())),
        };
        self.configured = true;
        Ok(())
    }

    fn handle_rtp_packet(&mut self, packet: &RtpPacket) -> Result<Vec<u8>> {
        if !self.configured {
            return Err(CoreError::CodecNotConfigured);
        }

        if let Some(last) = self.last_sequence {
            let delta = packet.sequence_number.wrapping_sub(last);
            if !(1..=32767).contains(&delta) {
                return Err(CoreError::OutOfSequence);
            }
        }

        let mut out = self.gap_fill(packet.timestamp);

        let (storage_header, speech) = if self.octet_aligned {
            self.decode_octet_aligned(&packet.payload)?
        } else {
            self.decode_bandwidth_efficient(&packet.payload)?
        };

        self.last_sequence = Some(packet.sequence_number);
        self.last_timestamp = Some(packet.timestamp);

        out.push(storage_header);
        out.extend_from_slice(&speech);
        Ok(out)
    }

    fn format_magic(&self) -> &'static [u8] {
        match self.band {
            Band::Nb => b"#!AMR\n",
            Band::Wb => b"#!AMR-WB\n",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn options(rate: &str, oa: &str) -> HashMap<String, String> {
        let mut m = HashMap::new();
        m.insert("sample-rate".to_string(), rate.to_string());
        m.insert("octet-aligned".to_string(), oa.to_string());
        m
    }

    fn packet(seq: u16, ts: u32, payload: Vec<u8>) -> RtpPacket {
        RtpPacket {
            received_at: SystemTime::now(),
            version: 2,
            padding: false,
            extension: false,
            marker: false,
            cc: 0,
            payload_type: 96,
            sequence_number: seq,
            timestamp: ts,
            ssrc: 1,
            csrc: vec![],
            extension_header_id: None,
            extension_header_length: None,
            extension_header: None,
            payload,
            raw: vec![],
        }
    }

    #[test]
    fn magic_headers_match_band() {
        let mut nb = AmrDepayloader::new();
        nb.configure(&options("nb", "1")).unwrap();
        assert_eq!(nb.format_magic(), b"#!AMR\n");

        let mut wb = AmrDepayloader::new();
        wb.configure(&options("wb", "1")).unwrap();
        assert_eq!(wb.format_magic(), b"#!AMR-WB\n");
    }

    #[test]
    fn octet_aligned_storage_header_ft0_q1() {
        let mut d = AmrDepayloader::new();
        d.configure(&options("nb", "1")).unwrap();
        // CMR nibble arbitrary; byte1: F=0, FT=0, Q=1, P=00 -> 0b0_0000_1_00 = 0x04
        let mut payload = vec![0x00, 0x04];
        payload.extend(vec![0u8; NB_FRAME_SIZE[0]]);
        let out = d.handle_rtp_packet(&packet(1, 0, payload)).unwrap();
        assert_eq!(out[0], 0x04);
    }

    #[test]
    fn octet_aligned_storage_header_ft7_q1() {
        let mut d = AmrDepayloader::new();
        d.configure(&options("nb", "1")).unwrap();
        // byte1: F=0, FT=7 (0b0111), Q=1 -> 0b0_0111_1_00 = 0x3C
        let mut payload = vec![0x00, 0x3C];
        payload.extend(vec![0u8; NB_FRAME_SIZE[7]]);
        let out = d.handle_rtp_packet(&packet(1, 0, payload)).unwrap();
        assert_eq!(out[0], 0x3C);
    }

    #[test]
    fn gap_fill_emits_no_data_markers() {
        let mut d = AmrDepayloader::new();
        d.configure(&options("nb", "1")).unwrap();
        let mut p0 = vec![0x00, 0x04];
        p0.extend(vec![0u8; NB_FRAME_SIZE[0]]);
        d.handle_rtp_packet(&packet(1, 0, p0)).unwrap();

        // 3 periods later (k=3): (3-1)=2 no-data markers expected.
        let mut p1 = vec![0x00, 0x04];
        p1.extend(vec![0u8; NB_FRAME_SIZE[0]]);
        let out = d.handle_rtp_packet(&packet(2, 3 * 160, p1)).unwrap();
        assert_eq!(&out[..2], &[NB_NO_DATA, NB_NO_DATA]);
    }

    #[test]
    fn multi_frame_payload_rejected() {
        let mut d = AmrDepayloader::new();
        d.configure(&options("nb", "1")).unwrap();
        let payload = vec![0x00, 0x84]; // F=1
        let err = d.handle_rtp_packet(&packet(1, 0, payload)).unwrap_err();
        assert!(matches!(err, CoreError::MultiFrameUnsupported));
    }

    #[test]
    fn out_of_sequence_rejected() {
        let mut d = AmrDepayloader::new();
        d.configure(&options("nb", "1")).unwrap();
        let mut p0 = vec![0x00, 0x04];
        p0.extend(vec![0u8; NB_FRAME_SIZE[0]]);
        d.handle_rtp_packet(&packet(5, 0, p0.clone())).unwrap();
        let err = d.handle_rtp_packet(&packet(5, 160, p0)).unwrap_err();
        assert!(matches!(err, CoreError::OutOfSequence));
    }

    #[test]
    fn reconfiguring_is_rejected() {
        let mut d = AmrDepayloader::new();
        d.configure(&options("nb", "1")).unwrap();
        let err = d.configure(&options("nb", "1")).unwrap_err();
        assert!(matches!(err, CoreError::CodecAlreadyConfigured));
    }

    #[test]
    fn bandwidth_efficient_decodes_without_error() {
        let mut d = AmrDepayloader::new();
        d.configure(&options("nb", "0")).unwrap();
        // FT=0 -> frame size 12; 2 header bytes minimum plus enough payload.
        let payload = vec![0x00u8; 14];
        let out = d.handle_rtp_packet(&packet(1, 0, payload)).unwrap();
        assert_eq!(out.len(), 1 + NB_FRAME_SIZE[0]);
    }

    #[test]
    fn bandwidth_efficient_speech_bytes_are_shifted_left_by_two() {
        let mut d = AmrDepayloader::new();
        d.configure(&options("nb", "0")).unwrap();
        // byte0: CMR=0000, F=0, ft_hi=100; byte1: ft_lo=0, Q=1, rest is
        // packed speech data. FT=8 -> frame size 5 (NB_FRAME_SIZE[8]).
        let payload = vec![0x04, 0x40, 0xC0, 0x0F, 0xAA, 0x55];
        let out = d.handle_rtp_packet(&packet(1, 0, payload)).unwrap();
        assert_eq!(out[0], 0x44);
        assert_eq!(&out[1..], &[0x03, 0x00, 0x3E, 0xA9, 0x54]);
    }
}
