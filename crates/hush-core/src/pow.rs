//! Proof-of-work over envelopes.
//!
//! The cost of a nonce is the number of leading zero bits of
//! `Blake3(seal_hash || nonce)`, normalised by envelope size and lifetime:
//!
//! ```text
//! pow = 2^bits / (size * ttl)
//! ```
//!
//! Bigger and longer-lived envelopes therefore need more work to reach the
//! same cost.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::error::{CoreError, Result};

/// Nonces tried between deadline and cancellation checks.
const CHECK_INTERVAL: u64 = 1024;

/// Hash a nonce against the seal hash.
pub fn pow_hash(seal_hash: &[u8; 32], nonce: u64) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(seal_hash);
    hasher.update(&nonce.to_be_bytes());
    *hasher.finalize().as_bytes()
}

/// Count leading zero bits of a digest.
pub fn leading_zero_bits(digest: &[u8; 32]) -> u32 {
    let mut bits = 0;
    for byte in digest {
        if *byte == 0 {
            bits += 8;
        } else {
            bits += byte.leading_zeros();
            break;
        }
    }
    bits
}

/// Cost of `bits` leading zeros for an envelope of `size` bytes living `ttl` seconds.
pub fn pow_for_bits(bits: u32, size: usize, ttl: u32) -> f64 {
    let denominator = (size.max(1) as f64) * f64::from(ttl.max(1));
    2f64.powi(bits as i32) / denominator
}

/// Smallest number of leading zero bits whose cost reaches `target`.
pub fn required_bits(target: f64, size: usize, ttl: u32) -> u32 {
    if !(target > 0.0) {
        return 0;
    }
    let work = target * (size.max(1) as f64) * f64::from(ttl.max(1));
    let bits = work.log2().ceil();
    if bits <= 0.0 {
        0
    } else {
        bits.min(256.0) as u32
    }
}

/// A bounded nonce search.
///
/// Runs until a nonce reaches `target_bits`, the time budget runs out, or
/// the cancellation token fires. On timeout the best nonce found so far is
/// returned.
pub struct PowSearch<'a> {
    seal_hash: [u8; 32],
    target_bits: u32,
    budget: Duration,
    cancel: &'a CancellationToken,
}

impl<'a> PowSearch<'a> {
    pub fn new(
        seal_hash: [u8; 32],
        target_bits: u32,
        budget: Duration,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            seal_hash,
            target_bits,
            budget,
            cancel,
        }
    }

    /// Run the search, returning `(nonce, bits)`.
    pub fn run(&self) -> Result<(u64, u32)> {
        let deadline = Instant::now() + self.budget;
        let mut best_nonce = 0u64;
        let mut best_bits = leading_zero_bits(&pow_hash(&self.seal_hash, 0));
        let mut nonce = 1u64;

        while best_bits < self.target_bits {
            if self.cancel.is_cancelled() {
                return Err(CoreError::Cancelled);
            }
            if Instant::now() >= deadline {
                tracing::debug!(
                    best_bits,
                    target_bits = self.target_bits,
                    "pow budget exhausted, keeping best nonce"
                );
                break;
            }
            for _ in 0..CHECK_INTERVAL {
                let bits = leading_zero_bits(&pow_hash(&self.seal_hash, nonce));
                if bits > best_bits {
                    best_bits = bits;
                    best_nonce = nonce;
                    if best_bits >= self.target_bits {
                        break;
                    }
                }
                nonce = nonce.wrapping_add(1);
            }
        }

        Ok((best_nonce, best_bits))
    }
}
