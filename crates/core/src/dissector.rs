//! Frame dissection: link layer → IP → UDP → RTP or ESP.
//!
//! A single entry point, [`dissect`], is invoked once per captured frame
//! by the capture driver. ESP tunnels re-enter this same logic on the
//! decrypted inner bytes, bounded to one extra level of recursion.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::SystemTime;

use etherparse::{NetSlice, SlicedPacket, TransportSlice};

use crate::error::{CoreError, Result};
use crate::esp;
use crate::keystore::KeyStore;
use crate::rtp::RtpPacket;
use crate::stream::{Endpoints, StreamIndex};

const ESP_NAT_T_PORT: u16 = 4500;
const MAX_ESP_RECURSION: u8 = 1;

/// UDP ports dropped in place of a kernel BPF filter: DNS,
/// NetBIOS, BOOTP, SSDP, IKE, NTP, SIP. UDP/4500 (ESP/NAT-T) is
/// deliberately not in this list.
const EXCLUDED_PORTS: [u16; 8] = [53, 138, 67, 68, 1900, 500, 123, 5060];

fn is_excluded_port(port: u16) -> bool {
    EXCLUDED_PORTS.contains(&port)
}

/// How to interpret the outermost bytes of a captured frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    /// Frame begins with an Ethernet II header.
    Ethernet,
    /// Frame begins directly with an IPv4/IPv6 header.
    RawIp,
}

/// Dissect one captured frame and, on success, submit the recovered RTP
/// packet to `streams`. Any rejection (non-IP, non-UDP, odd port, ESP
/// failure, RTP parse failure) is returned as an error for the caller to
/// log and skip — none of these are fatal to the overall dump.
pub fn dissect(
    frame: &[u8],
    link_type: LinkType,
    received_at: SystemTime,
    keystore: &KeyStore,
    streams: &mut StreamIndex,
) -> Result<()> {
    dissect_inner(frame, link_type, received_at, keystore, streams, 0)
}

fn dissect_inner(
    frame: &[u8],
    link_type: LinkType,
    received_at: SystemTime,
    keystore: &KeyStore,
    streams: &mut StreamIndex,
    depth: u8,
) -> Result<()> {
    let sliced = match link_type {
        LinkType::Ethernet => SlicedPacket::from_ethernet(frame),
        LinkType::RawIp => SlicedPacket::from_ip(frame),
    }
    .map_err(|e| CoreError::Capture(e.to_string()))?;

    let net = sliced.net.as_ref().ok_or(CoreError::NotIp)?;
    let (src_ip, dst_ip) = ip_addrs(net)?;

    let transport = sliced.transport.as_ref().ok_or(CoreError::NotUdp)?;
    let TransportSlice::Udp(udp) = transport else {
        return Err(CoreError::NotUdp);
    };
    let src_port = udp.source_port();
    let dst_port = udp.destination_port();

    if is_excluded_port(src_port) || is_excluded_port(dst_port) {
        return Err(CoreError::FilteredPort);
    }

    if src_port % 2 != 0 || dst_port % 2 != 0 {
        return Err(CoreError::LikelyRtcp);
    }

    let payload = udp.payload();

    if src_port == ESP_NAT_T_PORT || dst_port == ESP_NAT_T_PORT {
        if depth >= MAX_ESP_RECURSION {
            return Err(CoreError::RecursionDepthExceeded);
        }
        let recovered = decrypt_esp(payload, keystore)?;
        return dissect_inner(
            &recovered.bytes,
            LinkType::RawIp,
            received_at,
            keystore,
            streams,
            depth + 1,
        );
    }

    let packet = RtpPacket::parse(payload, received_at)?;
    streams.submit(
        packet,
        Endpoints {
            src_ip,
            dst_ip,
            src_port,
            dst_port,
        },
    );
    Ok(())
}

fn decrypt_esp(payload: &[u8], keystore: &KeyStore) -> Result<esp::RecoveredPacket> {
    if payload.len() < 8 {
        return Err(CoreError::EspCiphertextMisaligned(payload.len()));
    }
    let spi = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
    let entry = keystore.lookup(spi).ok_or(CoreError::NoKeyForSpi(spi))?;
    esp::decrypt(entry, &payload[8..])
}

fn ip_addrs(net: &NetSlice) -> Result<(String, String)> {
    match net {
        NetSlice::Ipv4(ipv4) => {
            let header = ipv4.header();
            let src: Ipv4Addr = header.source_addr();
            let dst: Ipv4Addr = header.destination_addr();
            Ok((src.to_string(), dst.to_string()))
        }
        NetSlice::Ipv6(ipv6) => {
            let header = ipv6.header();
            let src: Ipv6Addr = header.source_addr();
            let dst: Ipv6Addr = header.destination_addr();
            Ok((src.to_string(), dst.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keystore::KeyEntry;
    use etherparse::{PacketBuilder, Ipv4HeaderSlice};

    fn keystore_with(spi: u32, algorithm: &str, key: Vec<u8>) -> KeyStore {
        let mut path = std::env::temp_dir();
        path.push(format!(
            "rtp-extract-dissector-test-{:?}.txt",
            std::thread::current().id()
        ));
        std::fs::write(&path, format!("{spi:#010x} {algorithm} {}\n", hex::encode(&key))).unwrap();
        let ks = KeyStore::load(&path).unwrap();
        std::fs::remove_file(path).ok();
        ks
    }

    fn rtp_packet_bytes(seq: u16) -> Vec<u8> {
        let mut h = vec![0x80, 0x08, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1];
        h[2..4].copy_from_slice(&seq.to_be_bytes());
        h.extend_from_slice(&[0xAA, 0xBB]);
        h
    }

    fn udp_over_ipv4(src_port: u16, dst_port: u16, payload: &[u8]) -> Vec<u8> {
        let builder = PacketBuilder::ethernet2([1, 2, 3, 4, 5, 6], [6, 5, 4, 3, 2, 1])
            .ipv4([10, 0, 0, 1], [10, 0, 0, 2], 64)
            .udp(src_port, dst_port);
        let mut out = Vec::new();
        builder.write(&mut out, payload).unwrap();
        out
    }

    #[test]
    fn plain_rtp_submitted_to_streams() {
        let keystore = KeyStore::default();
        let mut streams = StreamIndex::new();
        let frame = udp_over_ipv4(30000, 30002, &rtp_packet_bytes(1));
        dissect(&frame, LinkType::Ethernet, SystemTime::now(), &keystore, &mut streams).unwrap();
        assert_eq!(streams.len(), 1);
        let s = streams.by_ssrc(1).unwrap();
        assert_eq!(s.endpoints.src_port, 30000);
        assert_eq!(s.endpoints.dst_port, 30002);
    }

    #[test]
    fn sip_and_dns_ports_filtered() {
        let keystore = KeyStore::default();
        let mut streams = StreamIndex::new();

        let sip_frame = udp_over_ipv4(5060, 6000, &rtp_packet_bytes(1));
        let err = dissect(&sip_frame, LinkType::Ethernet, SystemTime::now(), &keystore, &mut streams)
            .unwrap_err();
        assert!(matches!(err, CoreError::FilteredPort));

        let dns_frame = udp_over_ipv4(6000, 53, &rtp_packet_bytes(1));
        let err = dissect(&dns_frame, LinkType::Ethernet, SystemTime::now(), &keystore, &mut streams)
            .unwrap_err();
        assert!(matches!(err, CoreError::FilteredPort));

        assert!(streams.is_empty());
    }

    #[test]
    fn odd_port_rejected_as_rtcp() {
        let keystore = KeyStore::default();
        let mut streams = StreamIndex::new();
        let frame = udp_over_ipv4(30001, 30002, &rtp_packet_bytes(1));
        let err = dissect(&frame, LinkType::Ethernet, SystemTime::now(), &keystore, &mut streams)
            .unwrap_err();
        assert!(matches!(err, CoreError::LikelyRtcp));
        assert!(streams.is_empty());
    }

    #[test]
    fn esp_without_key_is_dropped() {
        let keystore = KeyStore::default();
        let mut streams = StreamIndex::new();
        let mut esp_payload = vec![0u8; 16];
        esp_payload[0..4].copy_from_slice(&0xdeadbeefu32.to_be_bytes());
        let frame = udp_over_ipv4(4500, 4500, &esp_payload);
        let err = dissect(&frame, LinkType::Ethernet, SystemTime::now(), &keystore, &mut streams)
            .unwrap_err();
        assert!(matches!(err, CoreError::NoKeyForSpi(0xdeadbeef)));
    }

    #[test]
    fn esp_tunnelled_rtp_recovered() {
        use cbc::cipher::{BlockEncryptMut, KeyIvInit};
        use des::TdesEde3;

        let key: Vec<u8> = (0u8..24).collect();
        let keystore = keystore_with(0xdeadbeef, "des3_cbc", key.clone());
        let mut streams = StreamIndex::new();

        let inner = udp_over_ipv4(30000, 30002, &rtp_packet_bytes(1));
        // Strip the Ethernet header PacketBuilder added; ESP carries a raw IP packet.
        let ipv4_offset = 14;
        let inner_ip = &inner[ipv4_offset..];
        let mut plaintext = inner_ip.to_vec();
        while plaintext.len() % 8 != 0 {
            plaintext.push(0);
        }

        let iv = [9u8; 8];
        let enc = cbc::Encryptor::<TdesEde3>::new_from_slices(&key, &iv).unwrap();
        let mut buf = plaintext.clone();
        let ct = enc
            .encrypt_padded_mut::<cbc::cipher::block_padding::NoPadding>(&mut buf, plaintext.len())
            .unwrap();

        let mut esp_payload = Vec::new();
        esp_payload.extend_from_slice(&0xdeadbeefu32.to_be_bytes()); // SPI
        esp_payload.extend_from_slice(&1u32.to_be_bytes()); // sequence
        esp_payload.extend_from_slice(&iv);
        esp_payload.extend_from_slice(ct);

        assert!(Ipv4HeaderSlice::from_slice(&plaintext).is_ok());

        let frame = udp_over_ipv4(4500, 4500, &esp_payload);
        dissect(&frame, LinkType::Ethernet, SystemTime::now(), &keystore, &mut streams).unwrap();
        assert_eq!(streams.len(), 1);
    }
}
