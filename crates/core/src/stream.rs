//! Stream identification and reassembly.
//!
//! Packets are grouped by SSRC into [`RtpStream`]s. [`StreamIndex`] keeps
//! both a `SSRC -> RtpStream` map (O(1) lookup) and an insertion-order list
//! (stable iteration for `streams`/`dump` CLI indexing), mirroring the
//! original tool's `rtpStreamsMap` + `rtpStreamsSorted` pair.
//!
//! ## Sequence-number wraparound
//!
//! The original tool drops any packet whose sequence number is not
//! strictly greater than the last accepted one, which also drops
//! legitimate post-wraparound traffic and misclassifies a first packet
//! with sequence 0. This implementation applies the RFC 3550 cyclic
//! distance test instead: a packet is accepted if it is the first seen
//! for its SSRC, or if `(new - cur) mod 2^16` falls in `1..=32767`.

use std::time::SystemTime;

use crate::rtp::RtpPacket;

/// Outer endpoint metadata supplied by the dissector.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub src_ip: String,
    pub dst_ip: String,
    pub src_port: u16,
    pub dst_port: u16,
}

/// A mutable per-SSRC aggregate.
#[derive(Debug)]
pub struct RtpStream {
    pub ssrc: u32,
    pub payload_type: u8,
    pub endpoints: Endpoints,
    pub start_time: SystemTime,
    pub end_time: SystemTime,
    first_seq: u16,
    first_timestamp: u32,
    cur_seq: u16,
    packets: Vec<RtpPacket>,
}

impl RtpStream {
    fn new(first: RtpPacket, endpoints: Endpoints) -> Self {
        let start_time = first.received_at;
        RtpStream {
            ssrc: first.ssrc,
            payload_type: first.payload_type,
            endpoints,
            start_time,
            end_time: start_time,
            first_seq: first.sequence_number,
            first_timestamp: first.timestamp,
            cur_seq: first.sequence_number,
            packets: vec![first],
        }
    }

    /// Append a packet that is known to belong to this stream's SSRC.
    ///
    /// Returns `false` (and drops the packet) if it fails the cyclic
    /// sequence-number acceptance test.
    fn add_packet(&mut self, packet: RtpPacket) -> bool {
        if !accepts(self.cur_seq, packet.sequence_number) {
            return false;
        }
        self.end_time = packet.received_at;
        self.cur_seq = packet.sequence_number;
        self.packets.push(packet);
        true
    }

    pub fn packets(&self) -> &[RtpPacket] {
        &self.packets
    }

    pub fn first_sequence(&self) -> u16 {
        self.first_seq
    }

    pub fn first_timestamp(&self) -> u32 {
        self.first_timestamp
    }

    pub fn current_sequence(&self) -> u16 {
        self.cur_seq
    }

    /// Expected packet count: `(cur_seq - first_seq) mod 2^16 + 1`.
    pub fn expected_packets(&self) -> u32 {
        self.cur_seq.wrapping_sub(self.first_seq) as u32 + 1
    }

    /// Lost = expected - received.
    pub fn lost_packets(&self) -> i64 {
        self.expected_packets() as i64 - self.packets.len() as i64
    }

    pub fn ssrc_hex(&self) -> String {
        format!("{:#010x}", self.ssrc)
    }
}

impl std::fmt::Display for RtpStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} - {}   {}   {:3}   {:5}   {}:{} -> {}:{}",
            humantime(self.start_time),
            humantime(self.end_time),
            self.ssrc_hex(),
            self.payload_type,
            self.packets.len(),
            self.endpoints.src_ip,
            self.endpoints.src_port,
            self.endpoints.dst_ip,
            self.endpoints.dst_port,
        )
    }
}

fn humantime(t: SystemTime) -> String {
    match t.duration_since(std::time::UNIX_EPOCH) {
        Ok(d) => format!("{}.{:06}", d.as_secs(), d.subsec_micros()),
        Err(_) => "unknown".to_string(),
    }
}

/// RFC 3550 cyclic-distance acceptance test.
fn accepts(cur_seq: u16, new_seq: u16) -> bool {
    let delta = new_seq.wrapping_sub(cur_seq);
    (1..=32767).contains(&delta)
}

/// SSRC-keyed collection of streams preserving first-seen order.
#[derive(Debug, Default)]
pub struct StreamIndex {
    streams: Vec<RtpStream>,
}

impl StreamIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Submit a successfully-parsed packet.
    pub fn submit(&mut self, packet: RtpPacket, endpoints: Endpoints) {
        if let Some(stream) = self.streams.iter_mut().find(|s| s.ssrc == packet.ssrc) {
            stream.add_packet(packet);
        } else {
            self.streams.push(RtpStream::new(packet, endpoints));
        }
    }

    /// All streams in first-seen order.
    pub fn streams(&self) -> &[RtpStream] {
        &self.streams
    }

    pub fn by_ssrc(&self, ssrc: u32) -> Option<&RtpStream> {
        self.streams.iter().find(|s| s.ssrc == ssrc)
    }

    pub fn get(&self, index: usize) -> Option<&RtpStream> {
        self.streams.get(index)
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}
