//! Per-peer relay state.
//!
//! Tracks, for every peer we have talked to, which envelopes it is known to
//! hold and which proof-of-work it asked for. Trust marks are kept apart so
//! a peer can be trusted before it connects.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::Instant;

use hush_core::EnvelopeId;

use crate::messages::PeerId;
use crate::policy::FanoutCandidate;
use crate::transport::PeerInfo;

#[derive(Debug, Default)]
struct PeerState {
    pow_requirement: f64,
    known: HashMap<EnvelopeId, Instant>,
}

/// Relay bookkeeping for all peers.
#[derive(Debug, Default)]
pub struct PeerBook {
    peers: RwLock<HashMap<PeerId, PeerState>>,
    trusted: RwLock<HashSet<PeerId>>,
}

impl PeerBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember that `peer` holds `id` until `ttl` from now.
    pub fn mark_known(&self, peer: &PeerId, id: &EnvelopeId, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        self.peers
            .write()
            .entry(*peer)
            .or_default()
            .known
            .insert(*id, expires_at);
    }

    /// Whether `peer` is known to hold a live copy of `id`.
    pub fn knows(&self, peer: &PeerId, id: &EnvelopeId) -> bool {
        let now = Instant::now();
        self.peers
            .read()
            .get(peer)
            .and_then(|state| state.known.get(id))
            .is_some_and(|expires_at| *expires_at > now)
    }

    /// Record the minimum proof-of-work a peer announced.
    pub fn set_pow_requirement(&self, peer: &PeerId, pow: f64) {
        self.peers.write().entry(*peer).or_default().pow_requirement = pow;
    }

    pub fn pow_requirement(&self, peer: &PeerId) -> f64 {
        self.peers
            .read()
            .get(peer)
            .map_or(0.0, |state| state.pow_requirement)
    }

    /// Allow direct (peer-to-peer) envelopes from this peer.
    pub fn mark_trusted(&self, peer: &PeerId) {
        self.trusted.write().insert(*peer);
    }

    pub fn is_trusted(&self, peer: &PeerId) -> bool {
        self.trusted.read().contains(peer)
    }

    /// Fan-out candidates among the connected peers for envelope `id`.
    pub fn candidates(&self, connected: &[PeerInfo], id: &EnvelopeId) -> Vec<FanoutCandidate> {
        let now = Instant::now();
        let peers = self.peers.read();
        connected
            .iter()
            .map(|info| {
                let state = peers.get(&info.id);
                FanoutCandidate {
                    peer: info.id,
                    knows: state
                        .and_then(|s| s.known.get(id))
                        .is_some_and(|expires_at| *expires_at > now),
                    pow_requirement: state.map_or(0.0, |s| s.pow_requirement),
                }
            })
            .collect()
    }

    /// Drop expired known-marks and state of peers no longer connected.
    /// Returns the number of known-marks removed.
    pub fn sweep(&self, connected: &[PeerInfo]) -> usize {
        let now = Instant::now();
        let connected: HashSet<PeerId> = connected.iter().map(|info| info.id).collect();
        let mut peers = self.peers.write();

        let mut removed = 0;
        peers.retain(|peer, state| {
            if !connected.contains(peer) {
                removed += state.known.len();
                return false;
            }
            let before = state.known.len();
            state.known.retain(|_, expires_at| *expires_at > now);
            removed += before - state.known.len();
            true
        });
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PeerRole;

    fn info(peer: PeerId) -> PeerInfo {
        PeerInfo { id: peer, role: PeerRole::Full }
    }

    #[tokio::test(start_paused = true)]
    async fn test_known_marks_expire() {
        let book = PeerBook::new();
        let peer = PeerId::random();
        let id = EnvelopeId::from_bytes([9; 32]);

        book.mark_known(&peer, &id, Duration::from_secs(5));
        assert!(book.knows(&peer, &id));
        assert!(book.candidates(&[info(peer)], &id)[0].knows);

        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(!book.knows(&peer, &id));
        assert_eq!(book.sweep(&[info(peer)]), 1);
    }

    #[test]
    fn test_sweep_forgets_disconnected_peers() {
        let book = PeerBook::new();
        let gone = PeerId::random();
        book.set_pow_requirement(&gone, 3.0);
        book.sweep(&[]);
        assert_eq!(book.pow_requirement(&gone), 0.0);
    }

    #[test]
    fn test_trust_survives_sweep() {
        let book = PeerBook::new();
        let peer = PeerId::random();
        assert!(!book.is_trusted(&peer));
        book.mark_trusted(&peer);
        book.sweep(&[]);
        assert!(book.is_trusted(&peer));
    }
}
