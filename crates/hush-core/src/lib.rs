//! # Hush Core
//!
//! Pure primitives for the Hush relay: topics, envelopes, encryption and
//! proof-of-work sealing.
//!
//! This crate contains no I/O, no storage, no networking. Sealing is CPU
//! bound and time-boxed; callers that live on an async runtime should run it
//! on a blocking thread.
//!
//! ## Key Types
//!
//! - [`Topic`] - 4-byte routing tag derived from arbitrary bytes
//! - [`Envelope`] - The sealed wire unit
//! - [`EnvelopeId`] - Content-addressed identifier (Blake3 hash)
//! - [`SymmetricKey`] / [`KeyPair`] - Key material for sealing and opening
//!
//! ## Sealing
//!
//! ```rust
//! use std::time::Duration;
//! use hush_core::{seal, try_decrypt, DecryptOutcome, DecryptionKey, EncryptionTarget,
//!     SealParams, SymmetricKey, Topic};
//! use tokio_util::sync::CancellationToken;
//!
//! let key = SymmetricKey::generate();
//! let params = SealParams::new(
//!     b"hello".to_vec(),
//!     Topic::derive(b"greetings"),
//!     EncryptionTarget::Symmetric(key.clone()),
//! )
//! .pow(0.01, Duration::from_millis(200));
//!
//! let envelope = seal(params, &CancellationToken::new()).unwrap();
//! match try_decrypt(&envelope, &DecryptionKey::Symmetric(key)) {
//!     DecryptOutcome::Opened(msg) => assert_eq!(msg.payload.as_ref(), b"hello"),
//!     DecryptOutcome::NoMatch => unreachable!(),
//! }
//! ```

pub mod canonical;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod pow;
pub mod seal;
pub mod topic;
pub mod types;

pub use canonical::{envelope_bytes, seal_header_bytes};
pub use crypto::{
    derive_symmetric_key, Ed25519PublicKey, KeyPair, SymmetricKey, X25519PublicKey,
};
pub use envelope::{Envelope, Validity, ENVELOPE_HEADER_LEN, SYNC_ALLOWANCE_SECS};
pub use error::{CoreError, Result};
pub use pow::{leading_zero_bits, pow_for_bits, required_bits, PowSearch};
pub use seal::{
    seal, try_decrypt, DecryptOutcome, DecryptionKey, EncryptionTarget, OpenedMessage,
    SealParams, DEFAULT_TTL, PADDING_BLOCK,
};
pub use topic::Topic;
pub use types::{now_secs, EnvelopeId};
