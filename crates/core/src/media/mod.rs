//! Codec registry and depayloader trait.
//!
//! A codec is described once as static [`CodecMetadata`] — a short name,
//! a long name, and its [`CodecOption`] descriptors — and instantiated
//! through [`configure`], which validates the caller's `name -> value`
//! option map against those descriptors before handing back a boxed,
//! single-shot-configured [`Depayloader`].

pub mod amr;
pub mod h264;

use std::collections::HashMap;

use crate::error::{CoreError, Result};
use crate::rtp::RtpPacket;

/// One configurable knob on a codec.
#[derive(Debug, Clone)]
pub struct CodecOption {
    pub name: &'static str,
    pub required: bool,
    /// `Some(values)` when only a fixed set of values is accepted; each
    /// pair is (value, human description), e.g. `("nb", "narrowband, 8kHz")`.
    pub restricted_values: Option<&'static [(&'static str, &'static str)]>,
}

impl std::fmt::Display for CodecOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "  {} ({})", self.name, if self.required { "required" } else { "optional" })?;
        if let Some(values) = self.restricted_values {
            write!(f, ":")?;
            for (value, desc) in values {
                write!(f, "\n    {value} - {desc}")?;
            }
        }
        Ok(())
    }
}

/// Static description of one codec.
#[derive(Debug, Clone)]
pub struct CodecMetadata {
    pub short_name: &'static str,
    pub long_name: &'static str,
    pub options: &'static [CodecOption],
}

impl std::fmt::Display for CodecMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} - {}", self.short_name, self.long_name)?;
        for option in self.options {
            writeln!(f, "{option}")?;
        }
        Ok(())
    }
}

/// Converts RTP payloads for one codec into storage-format output bytes.
///
/// Implementations are configured exactly once via [`Depayloader::configure`]
/// before any packet is handed to [`Depayloader::handle_rtp_packet`].
pub trait Depayloader {
    /// Validate and apply `options` (already checked against this codec's
    /// [`CodecMetadata`] by [`configure`]). Calling this twice is an error.
    fn configure(&mut self, options: &HashMap<String, String>) -> Result<()>;

    /// Process one packet in arrival order, returning storage-format bytes
    /// to append to the output file (possibly empty, e.g. a rejected
    /// aggregation packet is the caller's responsibility to skip, not
    /// this method's — callers treat an `Err` here as skip-and-log).
    fn handle_rtp_packet(&mut self, packet: &RtpPacket) -> Result<Vec<u8>>;

    /// Bytes written once at the start of the output file, before any
    /// packet's bytes.
    fn format_magic(&self) -> &'static [u8];
}

const REGISTRY: &[CodecMetadata] = &[amr::METADATA, h264::METADATA];

/// All codecs known to this build, in registration order.
pub fn registry() -> &'static [CodecMetadata] {
    REGISTRY
}

/// Look up a codec's metadata by its short name.
pub fn by_name(name: &str) -> Option<&'static CodecMetadata> {
    REGISTRY.iter().find(|m| m.short_name == name)
}

/// Validate `options` against `metadata` and construct a configured
/// depayloader.
pub fn configure(name: &str, options: &HashMap<String, String>) -> Result<Box<dyn Depayloader>> {
    let metadata = by_name(name).ok_or_else(|| CoreError::UnknownCodec(name.to_string()))?;
    validate_options(metadata, options)?;

    let mut depayloader: Box<dyn Depayloader> = match metadata.short_name {
        "amr" => Box::new(amr::AmrDepayloader::new()),
        "h264" => Box::new(h264::H264Depayloader::new()),
        _ => unreachable!("registry entries must have a constructor arm"),
    };
    depayloader.configure(options)?;
    Ok(depayloader)
}

fn validate_options(metadata: &CodecMetadata, options: &HashMap<String, String>) -> Result<()> {
    for opt in metadata.options {
        match options.get(opt.name) {
            None if opt.required => {
                return Err(CoreError::CodecConfig(format!("missing required option '{}'", opt.name)));
            }
            None => {}
            Some(value) => {
                if let Some(allowed) = opt.restricted_values {
                    if !allowed.iter().any(|(v, _)| v == value) {
                        return Err(CoreError::CodecConfig(format!(
                            "invalid value '{value}' for option '{}'",
                            opt.name
                        )));
                    }
                }
            }
        }
    }
    Ok(())
}
