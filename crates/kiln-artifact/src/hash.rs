//! Content hashing for generated artifacts
//!
//! Provides [`ContentHash`], a 32-byte Blake3 digest of a candidate's text.
//! Reports carry it so upstream writers can detect unchanged files.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// A 32-byte content hash (Blake3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Digest length in bytes
    pub const LEN: usize = 32;

    /// Compute the hash of a content string
    #[inline]
    #[must_use]
    pub fn of(content: &str) -> Self {
        Self(*blake3::hash(content.as_bytes()).as_bytes())
    }

    /// Raw digest bytes
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Short string representation (first 16 hex chars)
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl Display for ContentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for ContentHash {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        if bytes.len() != Self::LEN {
            return Err(HashError::InvalidLength {
                expected: Self::LEN,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl serde::Serialize for ContentHash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for ContentHash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Errors parsing a hex-encoded hash
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    /// Wrong number of bytes
    #[error("invalid hash length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// Not hex
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
}
