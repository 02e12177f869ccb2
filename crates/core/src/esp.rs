//! ESP (Encapsulating Security Payload) decryption.
//!
//! Only `des3_cbc` is understood: the first 8 octets of the ESP payload
//! are the CBC initialization vector, the remainder is ciphertext. The
//! decrypted cleartext is handed back as a recovered IP packet — try
//! IPv4 first, then IPv6 — for the dissector to process again.

use cbc::cipher::{BlockDecryptMut, KeyIvInit};
use des::TdesEde3;
use etherparse::{Ipv4HeaderSlice, Ipv6HeaderSlice};

use crate::error::{CoreError, Result};
use crate::keystore::KeyEntry;

const BLOCK_SIZE: usize = 8;
const DES3_CBC: &str = "des3_cbc";

type Des3CbcDec = cbc::Decryptor<TdesEde3>;

/// The IP version recovered after decryption, so the dissector can route
/// into the right IPv4/IPv6 decoder without re-sniffing bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveredIpVersion {
    V4,
    V6,
}

/// A decrypted ESP payload, interpreted as an IP packet.
#[derive(Debug, Clone)]
pub struct RecoveredPacket {
    pub version: RecoveredIpVersion,
    pub bytes: Vec<u8>,
}

/// Decrypt an ESP payload using the SPI's registered key entry.
///
/// `ciphertext_with_iv` is the ESP payload with the SPI and sequence
/// number fields already stripped by the caller: its first 8 octets are
/// the CBC IV, the remainder is ciphertext.
pub fn decrypt(entry: &KeyEntry, ciphertext_with_iv: &[u8]) -> Result<RecoveredPacket> {
    if entry.algorithm != DES3_CBC {
        return Err(CoreError::UnsupportedEspAlgorithm(entry.algorithm.clone()));
    }

    if ciphertext_with_iv.len() < BLOCK_SIZE {
        return Err(CoreError::EspCiphertextMisaligned(ciphertext_with_iv.len()));
    }
    let (iv, ciphertext) = ciphertext_with_iv.split_at(BLOCK_SIZE);
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(CoreError::EspCiphertextMisaligned(ciphertext.len()));
    }

    let decryptor = Des3CbcDec::new_from_slices(&entry.key, iv)
        .map_err(|_| CoreError::EspDecryptFailed)?;

    // ESP's own trailer (pad length + next header) is left in place; this
    // tool only needs the recovered IP header, which starts at byte 0, so
    // no un-padding scheme is applied here — raw CBC decryption is enough.
    let mut buf = ciphertext.to_vec();
    let cleartext = decryptor
        .decrypt_padded_mut::<cbc::cipher::block_padding::NoPadding>(&mut buf)
        .map_err(|_| CoreError::EspDecryptFailed)?
        .to_vec();

    if Ipv4HeaderSlice::from_slice(&cleartext).is_ok() {
        return Ok(RecoveredPacket {
            version: RecoveredIpVersion::V4,
            bytes: cleartext,
        });
    }
    if Ipv6HeaderSlice::from_slice(&cleartext).is_ok() {
        return Ok(RecoveredPacket {
            version: RecoveredIpVersion::V6,
            bytes: cleartext,
        });
    }
    Err(CoreError::EspInnerNotIp)
}
