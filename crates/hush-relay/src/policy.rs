//! Relay policy.
//!
//! Pure decisions: who may originate, and which peers an envelope is
//! forwarded to. No I/O happens here.

use serde::{Deserialize, Serialize};

use crate::messages::PeerId;

/// Role of a node in the mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerRole {
    /// Stores and relays for others.
    Full,
    /// Needs a full peer to originate.
    Light,
}

/// Outcome of the origination check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginationDecision {
    /// Nobody is connected.
    NoPeers,
    /// Local node is light and no connected peer is full.
    LightWithoutFull,
    /// The envelope may be sealed and relayed.
    Accepted,
}

/// Decide whether a node with `local` role may originate, given the roles
/// of its connected peers.
pub fn decide_origination(local: PeerRole, peers: &[PeerRole]) -> OriginationDecision {
    if peers.is_empty() {
        return OriginationDecision::NoPeers;
    }
    if local == PeerRole::Light && !peers.contains(&PeerRole::Full) {
        return OriginationDecision::LightWithoutFull;
    }
    OriginationDecision::Accepted
}

/// What the relay knows about one connected peer for one envelope.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FanoutCandidate {
    pub peer: PeerId,
    /// The peer already has the envelope (sent it to us, or we sent it).
    pub knows: bool,
    /// Minimum proof-of-work the peer announced.
    pub pow_requirement: f64,
}

/// Peers an envelope with proof-of-work `pow` should be forwarded to.
///
/// Never includes `source`.
pub fn fanout_targets(
    candidates: &[FanoutCandidate],
    source: Option<&PeerId>,
    pow: f64,
) -> Vec<PeerId> {
    candidates
        .iter()
        .filter(|c| Some(&c.peer) != source)
        .filter(|c| !c.knows)
        .filter(|c| c.pow_requirement <= pow)
        .map(|c| c.peer)
        .collect()
}
