//! The relay engine.
//!
//! Owns the inbound path (validate, dedup, match, fan out) and the outbound
//! path for local originations. Sends are fire-and-forget: each runs in its
//! own task, and failures are logged and counted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use hush_core::{now_secs, Envelope, EnvelopeId, Validity};
use hush_filter::{Delivery, FilterEngine};
use hush_store::{InsertResult, Store};

use crate::error::{RelayError, Result};
use crate::messages::{PeerId, RelayMessage};
use crate::peers::PeerBook;
use crate::policy::{decide_origination, fanout_targets, OriginationDecision, PeerRole};
use crate::transport::PeerNetwork;

/// Configuration for relay behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RelayConfig {
    /// Role of the local node.
    pub role: PeerRole,
    /// Envelopes below this proof-of-work are dropped.
    pub min_pow: f64,
    /// Envelopes above this size are dropped.
    pub max_message_size: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            role: PeerRole::Full,
            min_pow: 0.2,
            max_message_size: 1024 * 1024,
        }
    }
}

/// Outcome of processing one inbound envelope.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IngestOutcome {
    /// Stored, matched against `matched` filters, and forwarded to `relayed` peers.
    Accepted { matched: usize, relayed: usize },
    /// Already in the store.
    Duplicate,
    /// Failed validation.
    Rejected(Validity),
    /// Store is at capacity.
    Dropped,
}

/// Relay counters.
#[derive(Debug, Default)]
pub struct RelayStats {
    received: AtomicU64,
    accepted: AtomicU64,
    duplicates: AtomicU64,
    rejected: AtomicU64,
    direct_received: AtomicU64,
    sent: AtomicU64,
    send_failures: AtomicU64,
}

/// Point-in-time copy of [`RelayStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayStatsSnapshot {
    pub received: u64,
    pub accepted: u64,
    pub duplicates: u64,
    pub rejected: u64,
    pub direct_received: u64,
    pub sent: u64,
    pub send_failures: u64,
}

impl RelayStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RelayStatsSnapshot {
        RelayStatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            accepted: self.accepted.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            direct_received: self.direct_received.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
        }
    }
}

/// Relay engine shared by all tasks of a node.
pub struct Relay<S: Store, N: PeerNetwork> {
    store: Arc<S>,
    network: Arc<N>,
    filters: Arc<FilterEngine>,
    peers: Arc<PeerBook>,
    role: PeerRole,
    max_message_size: usize,
    min_pow: RwLock<f64>,
    stats: Arc<RelayStats>,
}

impl<S: Store + 'static, N: PeerNetwork + 'static> Relay<S, N> {
    /// Create a relay.
    pub fn new(
        store: Arc<S>,
        network: Arc<N>,
        filters: Arc<FilterEngine>,
        peers: Arc<PeerBook>,
        config: RelayConfig,
    ) -> Self {
        Self {
            store,
            network,
            filters,
            peers,
            role: config.role,
            max_message_size: config.max_message_size,
            min_pow: RwLock::new(config.min_pow),
            stats: Arc::new(RelayStats::default()),
        }
    }

    pub fn role(&self) -> PeerRole {
        self.role
    }

    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    pub fn min_pow(&self) -> f64 {
        *self.min_pow.read()
    }

    pub fn stats(&self) -> RelayStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn peers(&self) -> &Arc<PeerBook> {
        &self.peers
    }

    pub fn network(&self) -> &Arc<N> {
        &self.network
    }

    /// Change the minimum proof-of-work and announce it to connected peers.
    pub async fn set_min_pow(&self, pow: f64) -> Result<()> {
        if !pow.is_finite() || pow < 0.0 {
            return Err(RelayError::InvalidMessage(format!("invalid min pow: {pow}")));
        }
        *self.min_pow.write() = pow;

        for info in self.network.connected_peers().await {
            self.spawn_send(info.id, RelayMessage::PowRequirement(pow));
        }
        tracing::info!(min_pow = pow, "updated minimum proof of work");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Origination
    // ─────────────────────────────────────────────────────────────────────────

    /// Check whether the local node may originate right now.
    ///
    /// Run before sealing, so that nothing is sealed on rejection.
    pub async fn check_origination(&self) -> Result<()> {
        let roles: Vec<PeerRole> = self
            .network
            .connected_peers()
            .await
            .iter()
            .map(|info| info.role)
            .collect();

        match decide_origination(self.role, &roles) {
            OriginationDecision::Accepted => Ok(()),
            OriginationDecision::NoPeers => Err(RelayError::NoPeers),
            OriginationDecision::LightWithoutFull => Err(RelayError::NoFullPeers),
        }
    }

    /// Admit a locally sealed envelope: store it, match it and fan it out.
    ///
    /// The origination policy is checked again here, since peers may have
    /// left while the envelope was being sealed.
    pub async fn originate(&self, envelope: Envelope) -> Result<EnvelopeId> {
        let min_pow = self.min_pow();
        match envelope.validate(now_secs(), self.max_message_size, min_pow) {
            Validity::Valid => {}
            Validity::InsufficientPow { pow } => {
                return Err(RelayError::PowTooLow { pow, required: min_pow })
            }
            Validity::TooLarge { size } => {
                return Err(RelayError::TooLarge { size, limit: self.max_message_size })
            }
            other => return Err(RelayError::InvalidMessage(format!("{other:?}"))),
        }
        self.check_origination().await?;

        let id = envelope.id();
        match self.store.insert_envelope(&envelope, remaining(&envelope)).await? {
            InsertResult::Inserted => {}
            InsertResult::AlreadySeen => return Ok(id),
            InsertResult::Full => {
                return Err(RelayError::Store(hush_store::StoreError::Unavailable(
                    "store at capacity".into(),
                )))
            }
        }

        let matched = self.filters.on_envelope(&envelope, Delivery::Relayed);
        let relayed = self.fan_out(&envelope, None).await;
        tracing::debug!(envelope = %id, matched, relayed, "originated envelope");
        Ok(id)
    }

    /// Send an envelope to one trusted peer outside relay.
    pub async fn send_direct(&self, peer: &PeerId, envelope: Envelope) -> Result<EnvelopeId> {
        if !self.network.is_connected(peer).await {
            return Err(RelayError::PeerNotConnected(*peer));
        }
        let id = envelope.id();
        self.network
            .send(peer, RelayMessage::Direct(vec![envelope]))
            .await?;
        RelayStats::bump(&self.stats.sent);
        Ok(id)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Inbound
    // ─────────────────────────────────────────────────────────────────────────

    /// Process one message from a peer.
    pub async fn handle_message(&self, from: PeerId, message: RelayMessage) {
        if let Err(reason) = message.validate_limits() {
            tracing::warn!(peer = %from, reason, "dropping message over limits");
            return;
        }

        match message {
            RelayMessage::Envelopes(envelopes) => {
                for envelope in envelopes {
                    if let Err(e) = self.handle_envelope(from, envelope).await {
                        tracing::warn!(peer = %from, error = %e, "failed to process envelope");
                    }
                }
            }
            RelayMessage::Direct(envelopes) => {
                for envelope in envelopes {
                    self.handle_direct(from, &envelope).await;
                }
            }
            RelayMessage::PowRequirement(pow) => {
                tracing::debug!(peer = %from, pow, "peer announced pow requirement");
                self.peers.set_pow_requirement(&from, pow);
            }
        }
    }

    /// Process one relayed envelope from a peer.
    pub async fn handle_envelope(&self, from: PeerId, envelope: Envelope) -> Result<IngestOutcome> {
        RelayStats::bump(&self.stats.received);
        let id = envelope.id();

        let validity = envelope.validate(now_secs(), self.max_message_size, self.min_pow());
        if validity != Validity::Valid {
            RelayStats::bump(&self.stats.rejected);
            tracing::warn!(peer = %from, envelope = %id, ?validity, "dropping invalid envelope");
            return Ok(IngestOutcome::Rejected(validity));
        }

        let ttl = remaining(&envelope);
        self.peers.mark_known(&from, &id, ttl);

        match self.store.insert_envelope(&envelope, ttl).await? {
            InsertResult::Inserted => {}
            InsertResult::AlreadySeen => {
                RelayStats::bump(&self.stats.duplicates);
                return Ok(IngestOutcome::Duplicate);
            }
            InsertResult::Full => return Ok(IngestOutcome::Dropped),
        }
        RelayStats::bump(&self.stats.accepted);

        let matched = self.filters.on_envelope(&envelope, Delivery::Relayed);
        let relayed = self.fan_out(&envelope, Some(&from)).await;
        tracing::debug!(peer = %from, envelope = %id, matched, relayed, "accepted envelope");
        Ok(IngestOutcome::Accepted { matched, relayed })
    }

    /// Process one direct envelope. Returns the number of filters matched.
    ///
    /// Direct envelopes are never pooled, but their identity still goes into
    /// the seen-set so a repeated send is matched only once.
    pub async fn handle_direct(&self, from: PeerId, envelope: &Envelope) -> usize {
        if !self.peers.is_trusted(&from) {
            tracing::warn!(peer = %from, "dropping direct envelope from untrusted peer");
            return 0;
        }
        if envelope.size() > self.max_message_size {
            tracing::warn!(peer = %from, size = envelope.size(), "dropping oversized direct envelope");
            return 0;
        }
        RelayStats::bump(&self.stats.direct_received);

        let id = envelope.id();
        match self.store.mark_seen(&id, remaining(envelope)).await {
            Ok(InsertResult::Inserted) => {}
            Ok(InsertResult::AlreadySeen) => {
                RelayStats::bump(&self.stats.duplicates);
                tracing::debug!(peer = %from, envelope = %id, "duplicate direct envelope");
                return 0;
            }
            Ok(InsertResult::Full) => {
                tracing::warn!(peer = %from, envelope = %id, "store full, dropping direct envelope");
                return 0;
            }
            Err(e) => {
                tracing::warn!(peer = %from, error = %e, "failed to record direct envelope");
                return 0;
            }
        }
        self.filters.on_envelope(envelope, Delivery::Direct)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Outbound
    // ─────────────────────────────────────────────────────────────────────────

    /// Forward an envelope to every eligible connected peer except `source`.
    /// Returns the number of sends started.
    pub async fn fan_out(&self, envelope: &Envelope, source: Option<&PeerId>) -> usize {
        let id = envelope.id();
        let connected = self.network.connected_peers().await;
        let candidates = self.peers.candidates(&connected, &id);
        let targets = fanout_targets(&candidates, source, envelope.pow());

        let ttl = remaining(envelope);
        for peer in &targets {
            self.peers.mark_known(peer, &id, ttl);
            self.spawn_send(*peer, RelayMessage::Envelopes(vec![envelope.clone()]));
        }
        targets.len()
    }

    /// Send every live pooled envelope the peer is not known to hold.
    pub async fn sync_peer(&self, peer: &PeerId) -> Result<usize> {
        if !self.network.is_connected(peer).await {
            return Err(RelayError::PeerNotConnected(*peer));
        }
        let now = now_secs();
        let pow_requirement = self.peers.pow_requirement(peer);
        let pending: Vec<Envelope> = self
            .store
            .envelopes()
            .await?
            .into_iter()
            .filter(|env| !env.is_expired(now))
            .filter(|env| env.pow() >= pow_requirement)
            .filter(|env| !self.peers.knows(peer, &env.id()))
            .collect();

        let count = pending.len();
        for env in &pending {
            self.peers.mark_known(peer, &env.id(), remaining(env));
        }
        for message in RelayMessage::batches(pending) {
            self.spawn_send(*peer, message);
        }
        tracing::debug!(peer = %peer, count, "synced pool to peer");
        Ok(count)
    }

    fn spawn_send(&self, peer: PeerId, message: RelayMessage) {
        let network = Arc::clone(&self.network);
        let stats = Arc::clone(&self.stats);
        tokio::spawn(async move {
            match network.send(&peer, message).await {
                Ok(()) => RelayStats::bump(&stats.sent),
                Err(e) => {
                    RelayStats::bump(&stats.send_failures);
                    tracing::warn!(peer = %peer, error = %e, "send failed");
                }
            }
        });
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Maintenance
    // ─────────────────────────────────────────────────────────────────────────

    /// Drop expired store entries and stale peer bookkeeping.
    pub async fn sweep(&self) -> Result<usize> {
        let expired = self.store.sweep_expired().await?;
        let connected = self.network.connected_peers().await;
        let forgotten = self.peers.sweep(&connected);
        if expired > 0 || forgotten > 0 {
            tracing::debug!(expired, forgotten, "swept expired entries");
        }
        Ok(expired)
    }
}

/// Time until the envelope expires, counted from now.
fn remaining(envelope: &Envelope) -> Duration {
    Duration::from_secs(envelope.expiry().saturating_sub(now_secs()))
}
