//! # Hush
//!
//! Topic-addressed, proof-of-work-gated encrypted pub/sub relay.
//!
//! ## Overview
//!
//! Hush nodes exchange opaque encrypted envelopes over a peer mesh. A node
//! only learns what an envelope says if it holds the right key:
//!
//! - **Envelopes**: encrypted payloads tagged with a 4-byte topic, stamped
//!   with proof-of-work and a time to live
//! - **Filters**: subscriptions (topics + key) queueing what they decrypt
//! - **Relay**: flood fan-out with role rules (light nodes need a full peer)
//! - **Boundary API**: the `shh_*` methods, see [`ShhApi`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use hush::{Node, NodeConfig, ShhApi, PostArgs, NewFilterArgs};
//! use hush_relay::{MemoryNetwork, PeerId, PeerRole};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let network = MemoryNetwork::new();
//! let a = network.create_transport(PeerId::random(), PeerRole::Full).await;
//! let b = network.create_transport(PeerId::random(), PeerRole::Full).await;
//! network.connect_all().await;
//!
//! let alice = Arc::new(Node::in_memory(NodeConfig::default(), a)?);
//! let bob = Arc::new(Node::in_memory(NodeConfig::default(), b)?);
//! alice.start();
//! bob.start();
//!
//! let bob_api = ShhApi::new(Arc::clone(&bob));
//! let key = bob_api.generate_sym_key_from_password("shared secret")?;
//! let filter = bob_api.new_message_filter(NewFilterArgs {
//!     sym_key_id: Some(key),
//!     topics: vec!["0x01020304".into()],
//!     ..Default::default()
//! })?;
//!
//! let alice_api = ShhApi::new(Arc::clone(&alice));
//! let key = alice_api.generate_sym_key_from_password("shared secret")?;
//! alice_api
//!     .post(PostArgs {
//!         sym_key_id: Some(key),
//!         topic: Some("0x01020304".into()),
//!         payload: "0x68656c6c6f".into(),
//!         pow_target: 0.2,
//!         pow_time: 1,
//!         ..Default::default()
//!     })
//!     .await?;
//!
//! let messages = bob_api.get_filter_messages(&filter)?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod node;

pub use api::{decode_hex, encode_hex, ApiError, ApiResult, MessageView, NewFilterArgs, PostArgs, ShhApi};
pub use config::NodeConfig;
pub use error::{NodeError, Result, CODE_INVALID_PARAMS, CODE_OPERATIONAL};
pub use node::{Node, NodeInfo, PostRequest, Recipient};

// Re-export the component crates for convenience.
pub use hush_core as core;
pub use hush_filter as filter;
pub use hush_relay as relay;
pub use hush_store as store;
