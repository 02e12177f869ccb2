//! H.264 depayloader: RTP payloads (RFC 6184) to Annex-B byte stream.
//!
//! Single-NAL and FU-A fragmentation are supported. STAP-A/B and MTAP
//! aggregation (NAL types 24-27) are rejected outright. FU-A fragments
//! need no reassembly buffer: the start fragment emits the Annex-B start
//! code and reconstructed NAL header, and every fragment after it
//! contributes only its payload tail — writing each packet's output in
//! arrival order reconstructs the full NAL unit in the output file.

use std::collections::HashMap;

use crate::error::{CoreError, Result};
use crate::rtp::RtpPacket;

use super::{CodecMetadata, CodecOption, Depayloader};

const ANNEX_B_START_CODE: [u8; 4] = [0, 0, 0, 1];
const NAL_TYPE_FU_A: u8 = 28;
const STAP_MTAP_RANGE: std::ops::RangeInclusive<u8> = 24..=27;

pub const METADATA: CodecMetadata = CodecMetadata {
    short_name: "h264",
    long_name: "H.264 / AVC video (RFC 6184)",
    options: &[CodecOption {
        name: "packetization-mode",
        required: true,
        restricted_values: Some(&[
            ("0", "Single NAL Unit Mode"),
            ("1", "Non-Interleaved Mode"),
            ("2", "Interleaved Mode"),
        ]),
    }],
};

pub struct H264Depayloader {
    configured: bool,
    packetization_mode: u8,
}

impl H264Depayloader {
    pub fn new() -> Self {
        H264Depayloader { configured: false, packetization_mode: 0 }
    }

    fn handle_fu_a(&self, payload: &[u8]) -> Result<Vec<u8>> {
        if payload.len() < 2 {
            return Err(CoreError::ShortPayload { need: 2, have: payload.len() });
        }
        let fu_indicator = payload[0];
        let fu_header = payload[1];
        let start = fu_header & 0x80 != 0;

        if start {
            let nal_header = (fu_indicator & 0xE0) | (fu_header & 0x1F);
            let mut out = Vec::with_capacity(4 + 1 + payload.len() - 2);
            out.extend_from_slice(&ANNEX_B_START_CODE);
            out.push(nal_header);
            out.extend_from_slice(&payload[2..]);
            Ok(out)
        } else {
            Ok(payload[2..].to_vec())
        }
    }
}

impl Default for H264Depayloader {
    fn default() -> Self {
        Self::new()
    }
}

impl Depayloader for H264Depayloader {
    fn configure(&mut self, options: &HashMap<String, String>) -> Result<()> {
        if self.configured {
            return Err(CoreError::CodecAlreadyConfigured);
        }
        self.packetization_mode = match options.get("packetization-mode").map(String::as_str) {
            Some("0") => 0,
            Some("1") => 1,
            Some("2") => 2,
            _ => {
                return Err(CoreError::CodecConfig(
                    "packetization-mode must be '0', '1' or '2'".into(),
                ))
            }
        };
        self.configured = true;
        Ok(())
    }

    fn handle_rtp_packet(&mut self, packet: &RtpPacket) -> Result<Vec<u8>> {
        if !self.configured {
            return Err(CoreError::CodecNotConfigured);
        }
        let payload = &packet.payload;
        if payload.is_empty() {
            return Err(CoreError::ShortPayload { need: 1, have: 0 });
        }

        let header = payload[0];
        if header & 0x80 != 0 {
            return Err(CoreError::ForbiddenBitSet);
        }
        let nal_type = header & 0x1F;

        if STAP_MTAP_RANGE.contains(&nal_type) {
            return Err(CoreError::AggregationUnsupported);
        }

        if nal_type == NAL_TYPE_FU_A {
            return self.handle_fu_a(payload);
        }

        if (1..=23).contains(&nal_type) {
            let mut out = Vec::with_capacity(4 + payload.len());
            out.extend_from_slice(&ANNEX_B_START_CODE);
            out.extend_from_slice(payload);
            return Ok(out);
        }

        Err(CoreError::UnsupportedNalType(nal_type))
    }

    fn format_magic(&self) -> &'static [u8] {
        &[]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn packet(payload: Vec<u8>) -> RtpPacket {
        RtpPacket {
            received_at: SystemTime::now(),
            version: 2,
            padding: false,
            extension: false,
            marker: false,
            cc: 0,
            payload_type: 96,
            sequence_number: 1,
            timestamp: 0,
            ssrc: 1,
            csrc: vec![],
            extension_header_id: None,
            extension_header_length: None,
            extension_header: None,
            payload,
            raw: vec![],
        }
    }

    fn options(mode: &str) -> HashMap<String, String> {
        let mut m = HashMap::new();
        m.insert("packetization-mode".to_string(), mode.to_string());
        m
    }

    fn configured() -> H264Depayloader {
        let mut d = H264Depayloader::new();
        d.configure(&options("1")).unwrap();
        d
    }

    #[test]
    fn single_nal_idr_framed() {
        let mut d = configured();
        // nal_type 5 (IDR), NRI 3.
        let mut payload = vec![0x65];
        payload.extend_from_slice(&[0xAA, 0xBB, 0xCC]);
        let out = d.handle_rtp_packet(&packet(payload.clone())).unwrap();
        let mut expected = vec![0, 0, 0, 1];
        expected.extend_from_slice(&payload);
        assert_eq!(out, expected);
    }

    #[test]
    fn forbidden_bit_rejected() {
        let mut d = configured();
        let err = d.handle_rtp_packet(&packet(vec![0x85, 0, 0])).unwrap_err();
        assert!(matches!(err, CoreError::ForbiddenBitSet));
    }

    #[test]
    fn aggregation_rejected() {
        let mut d = configured();
        let err = d.handle_rtp_packet(&packet(vec![24, 0, 0])).unwrap_err();
        assert!(matches!(err, CoreError::AggregationUnsupported));
    }

    #[test]
    fn fu_a_start_reconstructs_header() {
        let mut d = configured();
        // FU indicator: NRI=2<<5, type=28. FU header: S=1, type=5 (IDR).
        let fu_indicator = 0x40 | 28;
        let fu_header = 0x80 | 5;
        let payload = vec![fu_indicator, fu_header, 0xDE, 0xAD];
        let out = d.handle_rtp_packet(&packet(payload)).unwrap();
        assert_eq!(out[..4], [0, 0, 0, 1]);
        assert_eq!(out[4], (fu_indicator & 0xE0) | (fu_header & 0x1F));
        assert_eq!(&out[5..], &[0xDE, 0xAD]);
    }

    #[test]
    fn fu_a_continuation_emits_only_payload_tail() {
        let mut d = configured();
        let fu_indicator = 0x40 | 28;
        let fu_header = 5; // S=0, E=0
        let payload = vec![fu_indicator, fu_header, 0xBE, 0xEF];
        let out = d.handle_rtp_packet(&packet(payload)).unwrap();
        assert_eq!(out, vec![0xBE, 0xEF]);
    }

    #[test]
    fn fu_a_end_fragment_also_emits_only_tail() {
        let mut d = configured();
        let fu_indicator = 28;
        let fu_header = 0x40 | 5; // E=1
        let payload = vec![fu_indicator, fu_header, 0x01];
        let out = d.handle_rtp_packet(&packet(payload)).unwrap();
        assert_eq!(out, vec![0x01]);
    }

    #[test]
    fn reconfiguring_is_rejected() {
        let mut d = configured();
        assert!(matches!(d.configure(&options("1")), Err(CoreError::CodecAlreadyConfigured)));
    }

    #[test]
    fn missing_packetization_mode_rejected() {
        let mut d = H264Depayloader::new();
        let err = d.configure(&HashMap::new()).unwrap_err();
        assert!(matches!(err, CoreError::CodecConfig(_)));
    }

    #[test]
    fn invalid_packetization_mode_rejected() {
        let mut d = H264Depayloader::new();
        let err = d.configure(&options("3")).unwrap_err();
        assert!(matches!(err, CoreError::CodecConfig(_)));
    }
}
