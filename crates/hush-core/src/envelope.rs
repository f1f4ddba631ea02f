//! Envelope: the sealed wire unit.
//!
//! An envelope is immutable once sealed. Its identity, proof-of-work and
//! validity window are all derived from its fields.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::canonical::{decode_envelope, envelope_bytes, seal_header_bytes};
use crate::error::Result;
use crate::pow::{leading_zero_bits, pow_for_bits, pow_hash};
use crate::topic::Topic;
use crate::types::EnvelopeId;

/// Domain prefix for envelope identity hashing.
const ID_DOMAIN: &[u8] = b"hush-envelope-v1:";

/// Fixed per-envelope overhead counted towards proof-of-work size:
/// timestamp (8) + ttl (4) + topic (4) + nonce (8).
pub const ENVELOPE_HEADER_LEN: usize = 24;

/// How far in the future an envelope's timestamp may be, to tolerate clock
/// drift between peers.
pub const SYNC_ALLOWANCE_SECS: u64 = 10;

/// A sealed envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Creation time (Unix seconds).
    pub timestamp: u64,
    /// Time to live in seconds.
    pub ttl: u32,
    /// Routing topic.
    pub topic: Topic,
    /// Encrypted payload.
    pub data: Bytes,
    /// Proof-of-work nonce.
    pub nonce: u64,
}

/// Result of checking an envelope against local acceptance rules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Validity {
    Valid,
    /// The envelope's lifetime has ended.
    Expired,
    /// The envelope claims to be created in the future.
    FromFuture,
    /// The envelope exceeds the maximum message size.
    TooLarge { size: usize },
    /// The envelope's proof-of-work is below the minimum.
    InsufficientPow { pow: f64 },
}

impl Envelope {
    /// Compute the content-addressed identity.
    pub fn id(&self) -> EnvelopeId {
        let mut hasher = blake3::Hasher::new();
        hasher.update(ID_DOMAIN);
        hasher.update(&envelope_bytes(self));
        EnvelopeId(*hasher.finalize().as_bytes())
    }

    /// Hash of every field except the nonce (the proof-of-work preimage).
    pub fn seal_hash(&self) -> [u8; 32] {
        *blake3::hash(&seal_header_bytes(self)).as_bytes()
    }

    /// Size counted for proof-of-work and size limits.
    pub fn size(&self) -> usize {
        ENVELOPE_HEADER_LEN + self.data.len()
    }

    /// Expiry time (Unix seconds).
    pub fn expiry(&self) -> u64 {
        self.timestamp.saturating_add(u64::from(self.ttl))
    }

    /// Whether the validity window has closed at `now`.
    pub fn is_expired(&self, now: u64) -> bool {
        self.expiry() <= now
    }

    /// Leading zero bits achieved by the nonce.
    pub fn pow_bits(&self) -> u32 {
        leading_zero_bits(&pow_hash(&self.seal_hash(), self.nonce))
    }

    /// Recompute the proof-of-work cost.
    pub fn pow(&self) -> f64 {
        pow_for_bits(self.pow_bits(), self.size(), self.ttl)
    }

    /// Check the envelope against acceptance rules.
    pub fn validate(&self, now: u64, max_size: usize, min_pow: f64) -> Validity {
        if self.size() > max_size {
            return Validity::TooLarge { size: self.size() };
        }
        if self.timestamp > now + SYNC_ALLOWANCE_SECS {
            return Validity::FromFuture;
        }
        if self.is_expired(now) {
            return Validity::Expired;
        }
        let pow = self.pow();
        if pow < min_pow {
            return Validity::InsufficientPow { pow };
        }
        Validity::Valid
    }

    /// Serialize to canonical bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        envelope_bytes(self)
    }

    /// Deserialize from canonical bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        decode_envelope(bytes)
    }
}
