//! Error types for the node.

use hush_core::CoreError;
use hush_filter::FilterError;
use hush_relay::RelayError;
use hush_store::StoreError;
use thiserror::Error;

/// JSON-RPC code for operational failures.
pub const CODE_OPERATIONAL: i32 = -32000;

/// JSON-RPC code for malformed parameters.
pub const CODE_INVALID_PARAMS: i32 = -32602;

/// Errors that can occur during node operations.
#[derive(Debug, Error)]
pub enum NodeError {
    /// Envelope or crypto error.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Key or filter error.
    #[error("{0}")]
    Filter(#[from] FilterError),

    /// Relay error. Shown verbatim: callers match on these messages.
    #[error(transparent)]
    Relay(#[from] RelayError),

    /// Request parameters are malformed.
    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// Configuration is invalid.
    #[error("invalid config: {0}")]
    Config(String),

    /// A background task failed.
    #[error("internal error: {0}")]
    Internal(String),
}

impl NodeError {
    /// JSON-RPC error code for this error.
    pub fn code(&self) -> i32 {
        match self {
            NodeError::InvalidParams(_)
            | NodeError::Filter(FilterError::InvalidInput(_))
            | NodeError::Core(
                CoreError::InvalidInput(_) | CoreError::InvalidKey(_) | CoreError::InvalidTopic(_),
            ) => CODE_INVALID_PARAMS,
            _ => CODE_OPERATIONAL,
        }
    }
}

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, NodeError>;
