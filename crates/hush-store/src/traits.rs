//! Store trait: the abstract interface for the relay cache.

use std::time::Duration;

use async_trait::async_trait;
use hush_core::{Envelope, EnvelopeId};

use crate::error::Result;

/// Result of admitting an envelope identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertResult {
    /// The identity was new (or its previous entry had expired).
    Inserted,
    /// The identity is already present and live (not an error).
    AlreadySeen,
    /// The store is at capacity even after evicting expired entries.
    Full,
}

/// The Store trait: async interface for the seen-set and envelope pool.
///
/// # Design Notes
///
/// - **Idempotent inserts**: inserting a live identity again returns `AlreadySeen`.
/// - **Expiry**: entries stop being visible `ttl` after insertion.
#[async_trait]
pub trait Store: Send + Sync {
    /// Whether a live entry exists for this identity.
    async fn seen(&self, id: &EnvelopeId) -> Result<bool>;

    /// Remember an identity for `ttl`.
    async fn mark_seen(&self, id: &EnvelopeId, ttl: Duration) -> Result<InsertResult>;

    /// Remember an envelope (and its identity) for `ttl`.
    async fn insert_envelope(&self, envelope: &Envelope, ttl: Duration) -> Result<InsertResult>;

    /// Fetch a live envelope by identity.
    async fn get_envelope(&self, id: &EnvelopeId) -> Result<Option<Envelope>>;

    /// All live envelopes in the pool.
    async fn envelopes(&self) -> Result<Vec<Envelope>>;

    /// Drop expired entries, returning how many were removed.
    async fn sweep_expired(&self) -> Result<usize>;

    /// Number of live entries.
    async fn len(&self) -> Result<usize>;
}
