//! ESP key file loading.
//!
//! One entry per non-empty line: `<SPI> <algorithm> <hex-key>`, SPI and key
//! may carry a `0x` prefix. Lines that don't split into exactly three
//! whitespace-separated tokens, or whose SPI/key fail to parse as hex, are
//! skipped rather than treated as a load failure — a key file is typically
//! hand-edited and a single bad line shouldn't abort the whole session.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::Result;

/// A single key-file entry: algorithm name and raw key bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEntry {
    pub algorithm: String,
    pub key: Vec<u8>,
}

/// SPI -> [`KeyEntry`] lookup table, loaded once before processing begins.
#[derive(Debug, Default)]
pub struct KeyStore {
    entries: HashMap<u32, KeyEntry>,
}

impl KeyStore {
    /// Load a key file. Malformed lines are skipped and
    /// logged at `debug`, not reported as an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let mut entries = HashMap::new();

        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut tokens = line.split_whitespace();
            let (Some(spi_tok), Some(alg_tok), Some(key_tok)) =
                (tokens.next(), tokens.next(), tokens.next())
            else {
                tracing::debug!(lineno, "key file line skipped: not three tokens");
                continue;
            };

            let Some(spi) = parse_hex_u32(spi_tok) else {
                tracing::debug!(lineno, spi_tok, "key file line skipped: bad SPI");
                continue;
            };
            let Some(key) = parse_hex_bytes(key_tok) else {
                tracing::debug!(lineno, "key file line skipped: bad key hex");
                continue;
            };

            entries.insert(
                spi,
                KeyEntry {
                    algorithm: alg_tok.to_string(),
                    key,
                },
            );
        }

        Ok(KeyStore { entries })
    }

    /// Look up the key entry registered for an SPI, if any.
    pub fn lookup(&self, spi: u32) -> Option<&KeyEntry> {
        self.entries.get(&spi)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_hex_u32(tok: &str) -> Option<u32> {
    let tok = tok.strip_prefix("0x").or_else(|| tok.strip_prefix("0X")).unwrap_or(tok);
    u32::from_str_radix(tok, 16).ok()
}

fn parse_hex_bytes(tok: &str) -> Option<Vec<u8>> {
    let tok = tok.strip_prefix("0x").or_else(|| tok.strip_prefix("0X")).unwrap_or(tok);
    hex::decode(tok).ok()
}
