//! # Hush Store
//!
//! Storage abstraction for the relay cache. Provides a trait-based interface
//! for the envelope dedup set and pool, with an in-memory implementation.
//!
//! ## Overview
//!
//! Every envelope a node accepts is remembered by identity until its
//! lifetime ends. The relay consults this set before matching or
//! forwarding, so a flood of duplicates is processed once.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all storage operations
//! - [`MemoryStore`] - Bounded in-memory storage
//! - [`InsertResult`] - Result of admitting an envelope
//!
//! ## Usage
//!
//! ```rust
//! use std::time::Duration;
//! use hush_core::EnvelopeId;
//! use hush_store::{InsertResult, MemoryStore, Store};
//!
//! # async fn example() -> hush_store::Result<()> {
//! let store = MemoryStore::new(1024);
//! let id = EnvelopeId::from_bytes([1; 32]);
//!
//! assert_eq!(store.mark_seen(&id, Duration::from_secs(50)).await?, InsertResult::Inserted);
//! assert!(store.seen(&id).await?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Design Notes
//!
//! - **No persistence**: contents are lost when the store is dropped
//! - **Lazy expiry**: expired entries are invisible immediately and
//!   reclaimed by [`Store::sweep_expired`] or on demand when full
//! - **Re-admission**: an expired entry never blocks the same identity

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use traits::{InsertResult, Store};
