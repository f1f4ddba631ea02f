//! # Hush Testkit
//!
//! Testing utilities for Hush.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: multi-node meshes over the in-memory transport, and
//!   helpers for sealing envelopes without a node
//! - **Generators**: Proptest strategies for property-based testing
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use hush_relay::PeerRole;
//! use hush_testkit::TestMesh;
//!
//! # async fn example() {
//! let mesh = TestMesh::new(&[PeerRole::Light, PeerRole::Full]).await;
//! mesh.connect(0, 1).await;
//! let key = mesh.api(1).new_sym_key().unwrap();
//! # }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use hush_testkit::generators::{sealed_from_input, SealInput};
//!
//! proptest! {
//!     #[test]
//!     fn id_survives_the_wire(input: SealInput) {
//!         let (envelope, _) = sealed_from_input(&input);
//!         let decoded = hush_core::Envelope::from_bytes(&envelope.to_bytes()).unwrap();
//!         prop_assert_eq!(decoded.id(), envelope.id());
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{seal_quick, wait_for_messages, TestApi, TestMesh, TestNode};
pub use generators::{sealed_from_input, SealInput};
