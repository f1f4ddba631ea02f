//! Relay wire messages.
//!
//! These messages are exchanged between connected peers. Envelopes travel
//! opaque; the only per-peer state a message can change is the sender's
//! announced proof-of-work requirement.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use hush_core::Envelope;

use crate::error::{RelayError, Result};

/// Unique identifier for a peer in the relay mesh.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(pub [u8; 32]);

impl PeerId {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Generate a random peer ID.
    pub fn random() -> Self {
        use rand::Rng;
        Self(rand::thread_rng().gen())
    }

    /// Encode as hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex, with or without a `0x` prefix.
    pub fn from_hex(s: &str) -> std::result::Result<Self, hex::FromHexError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

impl FromStr for PeerId {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

/// Message size limits.
pub mod limits {
    /// Max envelopes in one `Envelopes` or `Direct` message.
    pub const MAX_ENVELOPES_PER_MESSAGE: usize = 64;
    /// Max encoded size of one wire message.
    pub const MAX_WIRE_MESSAGE_SIZE: usize = 16 * 1024 * 1024;
}

/// Relay protocol messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RelayMessage {
    /// Envelopes for relay.
    Envelopes(Vec<Envelope>),

    /// Envelopes sent peer-to-peer, outside relay. Only accepted from
    /// trusted peers; never stored or forwarded.
    Direct(Vec<Envelope>),

    /// The sender drops envelopes below this proof-of-work.
    PowRequirement(f64),
}

impl RelayMessage {
    /// Check if this message respects size limits.
    pub fn validate_limits(&self) -> std::result::Result<(), &'static str> {
        match self {
            RelayMessage::Envelopes(envelopes) | RelayMessage::Direct(envelopes) => {
                if envelopes.len() > limits::MAX_ENVELOPES_PER_MESSAGE {
                    return Err("too many envelopes");
                }
            }
            RelayMessage::PowRequirement(pow) => {
                if !pow.is_finite() || *pow < 0.0 {
                    return Err("invalid pow requirement");
                }
            }
        }
        Ok(())
    }

    /// Encode for the wire.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| RelayError::InvalidMessage(e.to_string()))?;
        Ok(buf)
    }

    /// Decode from the wire.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > limits::MAX_WIRE_MESSAGE_SIZE {
            return Err(RelayError::InvalidMessage(format!(
                "wire message too large: {} bytes",
                bytes.len()
            )));
        }
        ciborium::from_reader(bytes).map_err(|e| RelayError::InvalidMessage(e.to_string()))
    }

    /// Split envelopes into limit-sized `Envelopes` messages.
    pub fn batches(envelopes: Vec<Envelope>) -> Vec<RelayMessage> {
        envelopes
            .chunks(limits::MAX_ENVELOPES_PER_MESSAGE)
            .map(|chunk| RelayMessage::Envelopes(chunk.to_vec()))
            .collect()
    }
}
