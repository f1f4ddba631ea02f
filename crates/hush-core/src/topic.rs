//! Topics: 4-byte routing tags.
//!
//! A topic is only used for coarse pre-filtering. Filters skip envelopes
//! whose topic they do not subscribe to before attempting decryption.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Domain separation context for topic derivation.
const TOPIC_CONTEXT: &str = "hush topic v1";

/// A 4-byte topic identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Topic(pub [u8; 4]);

impl Topic {
    /// Number of bytes in a topic.
    pub const LEN: usize = 4;

    /// Derive a topic from arbitrary bytes.
    ///
    /// Takes the leading bytes of a domain-separated Blake3 digest, so the
    /// same input always maps to the same topic.
    pub fn derive(data: &[u8]) -> Self {
        let digest = blake3::derive_key(TOPIC_CONTEXT, data);
        let mut arr = [0u8; 4];
        arr.copy_from_slice(&digest[..4]);
        Self(arr)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// Hex encoding with a `0x` prefix.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parse from hex, with or without a `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let trimmed = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        let bytes = hex::decode(trimmed).map_err(|e| CoreError::InvalidTopic(e.to_string()))?;
        let arr: [u8; 4] = bytes.as_slice().try_into().map_err(|_| {
            CoreError::InvalidTopic(format!("expected 4 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Topic({})", self.to_hex())
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Topic {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; 4]> for Topic {
    fn from(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }
}
