//! # Hush Filter
//!
//! Key material and subscriptions.
//!
//! ## Overview
//!
//! A node never learns what an envelope contains unless it holds the right
//! key. Callers register keys with the [`KeyRegistry`] and subscribe with
//! filters: a set of topics plus one key. Every envelope the node accepts
//! is offered to the [`FilterEngine`], which decrypts it against each filter
//! whose topics intersect, and queues the result until polled.
//!
//! ## Key Concepts
//!
//! - **KeyId**: opaque handle for a symmetric key or key pair
//! - **Filter**: topics + key + delivery policy + queue
//! - **Delivery**: whether an envelope arrived through relay or directly
//!   from a trusted peer (only `allow_p2p` filters accept the latter)
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use hush_core::Topic;
//! use hush_filter::{FilterEngine, FilterKey, FilterSpec, KeyRegistry};
//!
//! let keys = Arc::new(KeyRegistry::new());
//! let key_id = keys.generate_symmetric_key();
//!
//! let engine = FilterEngine::new(Arc::clone(&keys), 1000);
//! let filter_id = engine
//!     .register(FilterSpec::new(FilterKey::Symmetric(key_id), vec![Topic::derive(b"chat")]))
//!     .unwrap();
//!
//! assert_eq!(engine.poll(&filter_id).unwrap().count(), 0);
//! ```

pub mod engine;
pub mod error;
pub mod filter;
pub mod ids;
pub mod keys;

pub use engine::FilterEngine;
pub use error::{FilterError, Result};
pub use filter::{Delivery, Filter, FilterKey, FilterSpec, MatchedMessage};
pub use ids::{FilterId, KeyId};
pub use keys::{KeyMaterial, KeyRegistry};
