//! # Hush Relay
//!
//! Relay policy and peer fan-out.
//!
//! ## Overview
//!
//! Nodes form a flood-relay mesh. Every envelope a node accepts, whether
//! received or originated locally, is stored for its TTL, matched against
//! local filters, and forwarded to each connected peer that does not already
//! hold it.
//!
//! ## Key Properties
//!
//! - **Role-gated origination**: a node needs at least one peer, and a light
//!   node needs at least one full peer
//! - **No echo**: an envelope is never sent back to the peer it came from
//! - **PoW-gated**: envelopes below a node's minimum proof-of-work are
//!   dropped, and peers are not sent envelopes below their announced minimum
//! - **Fire-and-forget**: send failures are logged and counted, never fatal
//!
//! ## Message Flow
//!
//! ```text
//! Node A                              Node B
//!   |-------- PowRequirement --------->|
//!   |-------- Envelopes -------------->|   stored, matched, forwarded
//!   |-------- Direct ----------------->|   trusted only, matched
//! ```

pub mod error;
pub mod messages;
pub mod peers;
pub mod policy;
pub mod relay;
pub mod transport;

pub use error::{RelayError, Result};
pub use messages::{limits, PeerId, RelayMessage};
pub use peers::PeerBook;
pub use policy::{decide_origination, fanout_targets, FanoutCandidate, OriginationDecision, PeerRole};
pub use relay::{IngestOutcome, Relay, RelayConfig, RelayStats, RelayStatsSnapshot};
pub use transport::{memory::MemoryNetwork, memory::MemoryTransport, PeerInfo, PeerNetwork};
