//! Error types for Hush Core.

use thiserror::Error;

/// Errors that can occur while building, sealing or decoding envelopes.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid topic: {0}")]
    InvalidTopic(String),

    #[error("encryption error: {0}")]
    EncryptionError(String),

    #[error("key derivation error: {0}")]
    KeyDerivationError(String),

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),

    #[error("proof-of-work search cancelled")]
    Cancelled,
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
