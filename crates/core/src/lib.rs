//! # rtp_extract — RTP stream recovery from captured traffic
//!
//! A Rust library for pulling RTP media streams out of packet captures:
//! ESP-tunnelled traffic is decrypted, RTP headers are validated and
//! grouped by SSRC, and AMR or H.264 payloads are converted to
//! standalone storage-format files.
//!
//! ## Protocol references
//!
//! | RFC | Topic | How this crate uses it |
//! |-----|-------|----------------------|
//! | [RFC 3550](https://tools.ietf.org/html/rfc3550) | RTP | Header parsing, sequence/timestamp semantics, SSRC grouping |
//! | [RFC 4303](https://tools.ietf.org/html/rfc4303) | ESP | UDP-encapsulated (NAT-T) ESP tunnel decryption |
//! | [RFC 4867](https://tools.ietf.org/html/rfc4867) | AMR RTP payload | Octet-aligned and bandwidth-efficient depayloading |
//! | [RFC 6184](https://tools.ietf.org/html/rfc6184) | H.264 RTP payload | Single-NAL and FU-A depayloading to Annex-B |
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │  Adapters (CLI)                           │
//! ├──────────────────────────────────────────┤
//! │  Capture       — pcap source, link-type  │
//! │                  retry                   │
//! ├──────────────────────────────────────────┤
//! │  Dissector     — IP/UDP routing, ESP      │
//! │                  re-entry                │
//! │  Stream        — SSRC grouping, wraparound│
//! ├──────────────────────────────────────────┤
//! │  Rtp / Esp     — header parsing, 3DES-CBC │
//! │  Media         — Depayloader trait, codecs│
//! │  Replay        — UDP re-emission          │
//! └──────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use rtp_extract::keystore::KeyStore;
//! use rtp_extract::capture;
//!
//! let keystore = KeyStore::load("esp-keys.txt").unwrap();
//! let streams = capture::extract_streams("capture.pcap", &keystore).unwrap();
//! for stream in streams.streams() {
//!     println!("{stream}");
//! }
//! ```
//!
//! ## Crate layout
//!
//! - [`capture`] — pcap reading, Ethernet/raw-IP retry pass.
//! - [`dissector`] — per-frame IP/UDP routing, ESP re-entry, capture filter.
//! - [`esp`] — ESP (RFC 4303) decryption.
//! - [`rtp`] — RTP (RFC 3550) header parsing.
//! - [`stream`] — SSRC-keyed stream aggregation.
//! - [`media`] — [`media::Depayloader`] trait, codec registry, AMR/H.264.
//! - [`replay`] — UDP replay of a captured stream.
//! - [`keystore`] — ESP key file loading.
//! - [`error`] — [`CoreError`] enum and [`Result`] alias.

pub mod capture;
pub mod dissector;
pub mod error;
pub mod esp;
pub mod keystore;
pub mod media;
pub mod replay;
pub mod rtp;
pub mod stream;

pub use error::{CoreError, Result};
pub use media::Depayloader;
pub use rtp::RtpPacket;
pub use stream::{RtpStream, StreamIndex};
