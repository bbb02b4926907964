use std::fmt;
use std::str::FromStr;

use crate::errors::{ScanError, ScanResult};
use crate::kernel::{Digest, DIGEST_LEN};

/// The digest being searched for.
///
/// Holds the raw bytes in canonical MD5 order and the same value as the four
/// little-endian state words the kernel compares against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetDigest {
    bytes: Digest,
    words: [u32; 4],
}

impl TargetDigest {
    pub fn from_bytes(bytes: Digest) -> Self {
        let words = std::array::from_fn(|i| {
            u32::from_le_bytes([
                bytes[4 * i],
                bytes[4 * i + 1],
                bytes[4 * i + 2],
                bytes[4 * i + 3],
            ])
        });
        Self { bytes, words }
    }

    /// Decodes 32 hexadecimal digits (either case, surrounding whitespace ignored)
    pub fn from_hex(text: &str) -> ScanResult<Self> {
        let text = text.trim();
        if text.len() != 2 * DIGEST_LEN {
            return Err(ScanError::invalid_target(format!(
                "expected {} hex digits, got {}",
                2 * DIGEST_LEN,
                text.len()
            )));
        }
        let mut bytes = [0u8; DIGEST_LEN];
        hex::decode_to_slice(text, &mut bytes)
            .map_err(|e| ScanError::invalid_target(format!("'{}': {}", text, e)))?;
        Ok(Self::from_bytes(bytes))
    }

    pub fn as_bytes(&self) -> &Digest {
        &self.bytes
    }

    pub(crate) fn words(&self) -> &[u32; 4] {
        &self.words
    }
}

impl FromStr for TargetDigest {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl fmt::Display for TargetDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.bytes))
    }
}
