//! Capture-source adapter: reads a legacy-format pcap file and dissects
//! each frame.
//!
//! The dissector is tried first against the capture's frames interpreted
//! as Ethernet; if that pass recovers zero streams, the file is reread
//! and dissected again as raw IP (no link-layer header). This transparently
//! handles captures whose link-layer headers were stripped before capture.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::{Duration, SystemTime};

use pcap_file::pcap::PcapReader;

use crate::dissector::{self, LinkType};
use crate::error::{CoreError, Result};
use crate::keystore::KeyStore;
use crate::stream::StreamIndex;

/// Read every frame of `path` through the dissector, retrying as raw IP
/// if the Ethernet-framed pass recovers nothing.
pub fn extract_streams(path: impl AsRef<Path>, keystore: &KeyStore) -> Result<StreamIndex> {
    let path = path.as_ref();

    let mut streams = StreamIndex::new();
    run_pass(path, LinkType::Ethernet, keystore, &mut streams)?;

    if streams.is_empty() {
        tracing::debug!("no streams recovered as Ethernet, retrying as raw IP");
        run_pass(path, LinkType::RawIp, keystore, &mut streams)?;
    }

    Ok(streams)
}

fn run_pass(
    path: &Path,
    link_type: LinkType,
    keystore: &KeyStore,
    streams: &mut StreamIndex,
) -> Result<()> {
    let file = File::open(path)?;
    let mut reader = PcapReader::new(BufReader::new(file))
        .map_err(|e| CoreError::Capture(e.to_string()))?;

    while let Some(packet) = reader.next_packet() {
        let packet = match packet {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "capture read error, stopping pass");
                break;
            }
        };
        let received_at = capture_timestamp(packet.timestamp);
        if let Err(e) = dissector::dissect(&packet.data, link_type, received_at, keystore, streams) {
            tracing::debug!(error = %e, "frame skipped");
        }
    }

    Ok(())
}

fn capture_timestamp(ts: Duration) -> SystemTime {
    SystemTime::UNIX_EPOCH + ts
}
