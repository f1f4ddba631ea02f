//! Error types for the relay.

use thiserror::Error;

use crate::messages::PeerId;

/// Errors that can occur while originating or relaying envelopes.
#[derive(Debug, Error)]
pub enum RelayError {
    /// No peer is connected, so nothing could be relayed.
    #[error("no peers connected")]
    NoPeers,

    /// A light node can only originate through a full peer.
    #[error("no full peers connected while node is light")]
    NoFullPeers,

    /// The sealed envelope does not meet the node's minimum proof-of-work.
    #[error("insufficient proof of work: {pow} < {required}")]
    PowTooLow { pow: f64, required: f64 },

    /// The envelope exceeds the node's maximum message size.
    #[error("envelope too large: {size} > {limit}")]
    TooLarge { size: usize, limit: usize },

    /// Message validation failed.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(String),

    /// Peer is not connected.
    #[error("peer not connected: {0}")]
    PeerNotConnected(PeerId),

    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] hush_store::StoreError),

    /// Envelope codec error.
    #[error("core error: {0}")]
    Core(#[from] hush_core::CoreError),
}

/// Result type for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;
