//! Error types for keys and filters.

use thiserror::Error;

use crate::ids::{FilterId, KeyId};

/// Errors that can occur during key and filter operations.
#[derive(Debug, Error)]
pub enum FilterError {
    /// Malformed request, rejected before any state change.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Filter request is incomplete or inconsistent.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// Key not found, or of the wrong kind.
    #[error("key not found: {0}")]
    KeyNotFound(KeyId),

    /// Filter not found.
    #[error("filter not found: {0}")]
    FilterNotFound(FilterId),

    /// Core error.
    #[error("core error: {0}")]
    Core(#[from] hush_core::CoreError),
}

/// Result type for key and filter operations.
pub type Result<T> = std::result::Result<T, FilterError>;
