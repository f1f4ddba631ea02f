//! The Node: one participant of the relay mesh.
//!
//! Brings together the key registry, filters, message store and relay into
//! a service object. All state is shared behind `Arc`, so the node can be
//! used from many tasks at once.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use hush_core::{seal, EncryptionTarget, EnvelopeId, SealParams, Topic, X25519PublicKey};
use hush_filter::{FilterEngine, KeyId, KeyRegistry};
use hush_relay::{
    PeerBook, PeerId, PeerNetwork, Relay, RelayError, RelayMessage, RelayStatsSnapshot,
};
use hush_store::{MemoryStore, Store};

use crate::config::NodeConfig;
use crate::error::{NodeError, Result};

/// Messages buffered per peer. Further messages from that peer are dropped.
const PEER_QUEUE: usize = 256;

/// Who a posted message is encrypted for.
#[derive(Debug, Clone, Copy)]
pub enum Recipient {
    /// Symmetric key from the registry.
    SymmetricKey(KeyId),
    /// Holder of this public key.
    PublicKey(X25519PublicKey),
}

/// A message to seal and send.
#[derive(Debug, Clone)]
pub struct PostRequest {
    pub recipient: Recipient,
    pub topic: Topic,
    pub payload: Vec<u8>,
    /// Key pair in the registry to sign with.
    pub signer: Option<KeyId>,
    pub padding: Option<Vec<u8>>,
    /// Falls back to the configured default.
    pub ttl: Option<u32>,
    pub pow_target: f64,
    pub pow_time: Duration,
    /// Send directly to this trusted peer instead of relaying.
    pub target_peer: Option<PeerId>,
}

impl PostRequest {
    pub fn new(recipient: Recipient, topic: Topic, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            recipient,
            topic,
            payload: payload.into(),
            signer: None,
            padding: None,
            ttl: None,
            pow_target: 0.0,
            pow_time: Duration::ZERO,
            target_peer: None,
        }
    }

    pub fn pow(mut self, target: f64, time: Duration) -> Self {
        self.pow_target = target;
        self.pow_time = time;
        self
    }

    pub fn ttl(mut self, ttl: u32) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn signer(mut self, key: KeyId) -> Self {
        self.signer = Some(key);
        self
    }

    pub fn direct(mut self, peer: PeerId) -> Self {
        self.target_peer = Some(peer);
        self
    }
}

/// Node status.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    pub min_pow: f64,
    pub max_message_size: usize,
    /// Bytes held by pooled envelopes.
    pub memory: usize,
    /// Number of pooled envelopes.
    pub messages: usize,
}

/// A relay node.
pub struct Node<S: Store, N: PeerNetwork> {
    config: NodeConfig,
    keys: Arc<KeyRegistry>,
    filters: Arc<FilterEngine>,
    store: Arc<S>,
    relay: Arc<Relay<S, N>>,
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<N: PeerNetwork + 'static> Node<MemoryStore, N> {
    /// Create a node backed by an in-memory store.
    pub fn in_memory(config: NodeConfig, network: N) -> Result<Self> {
        let store = MemoryStore::new(config.store_capacity);
        Self::new(config, store, network)
    }
}

impl<S: Store + 'static, N: PeerNetwork + 'static> Node<S, N> {
    /// Create a node. Background tasks start with [`Node::start`].
    pub fn new(config: NodeConfig, store: S, network: N) -> Result<Self> {
        config.validate()?;

        let keys = Arc::new(KeyRegistry::new());
        let filters = Arc::new(FilterEngine::new(
            Arc::clone(&keys),
            config.filter_queue_capacity,
        ));
        let store = Arc::new(store);
        let relay = Arc::new(Relay::new(
            Arc::clone(&store),
            Arc::new(network),
            Arc::clone(&filters),
            Arc::new(PeerBook::new()),
            config.relay.clone(),
        ));

        Ok(Self {
            config,
            keys,
            filters,
            store,
            relay,
            shutdown: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn keys(&self) -> &Arc<KeyRegistry> {
        &self.keys
    }

    pub fn filters(&self) -> &Arc<FilterEngine> {
        &self.filters
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn relay(&self) -> &Arc<Relay<S, N>> {
        &self.relay
    }

    /// This node's identity in the mesh.
    pub fn peer_id(&self) -> PeerId {
        self.relay.network().local_peer_id()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Spawn the inbound dispatcher and the expiry sweep. Calling twice is a no-op.
    pub fn start(&self) {
        let mut tasks = self.tasks.lock();
        if !tasks.is_empty() || self.shutdown.is_cancelled() {
            return;
        }

        tasks.push(tokio::spawn(dispatch(
            Arc::clone(&self.relay),
            self.config.sweep_interval(),
            self.shutdown.clone(),
        )));
        tasks.push(tokio::spawn(sweep(
            Arc::clone(&self.relay),
            self.config.sweep_interval(),
            self.shutdown.clone(),
        )));

        tracing::info!(
            peer = %self.peer_id(),
            role = ?self.relay.role(),
            min_pow = self.relay.min_pow(),
            "node started"
        );
    }

    /// Stop all background work and wait for it to finish.
    pub async fn stop(&self) {
        self.shutdown.cancel();
        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "background task failed");
            }
        }
        tracing::info!(peer = %self.peer_id(), "node stopped");
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Messaging
    // ─────────────────────────────────────────────────────────────────────────

    /// Seal a message and relay it (or send it directly). Returns the envelope hash.
    ///
    /// The relay policy is checked before sealing and again after. Dropping
    /// the returned future cancels a running proof-of-work search.
    pub async fn post(&self, request: PostRequest) -> Result<EnvelopeId> {
        let target = match request.recipient {
            Recipient::SymmetricKey(id) => EncryptionTarget::Symmetric(self.keys.symmetric_key(&id)?),
            Recipient::PublicKey(public) => EncryptionTarget::PublicKey(public),
        };
        let signer = request
            .signer
            .map(|id| self.keys.key_pair(&id))
            .transpose()?;

        let ttl = request.ttl.unwrap_or(self.config.default_ttl);
        if ttl == 0 {
            return Err(NodeError::InvalidParams("ttl must be positive".into()));
        }
        if !request.pow_target.is_finite() || request.pow_target < 0.0 {
            return Err(NodeError::InvalidParams("powTarget must be a non-negative number".into()));
        }

        if request.target_peer.is_none() {
            self.relay.check_origination().await?;
        }

        let mut params = SealParams::new(request.payload, request.topic, target)
            .ttl(ttl)
            .pow(request.pow_target, request.pow_time.min(self.config.max_pow_time()));
        if let Some(signer) = signer {
            params = params.signer(signer);
        }
        if let Some(padding) = request.padding {
            params = params.padding(padding);
        }

        let cancel = self.shutdown.child_token();
        let guard = cancel.clone().drop_guard();
        let envelope = tokio::task::spawn_blocking(move || seal(params, &cancel))
            .await
            .map_err(|e| NodeError::Internal(e.to_string()))??;
        let _ = guard.disarm();

        let id = match request.target_peer {
            Some(peer) => self.relay.send_direct(&peer, envelope).await?,
            None => self.relay.originate(envelope).await?,
        };
        Ok(id)
    }

    /// Accept direct messages from this peer.
    pub fn mark_trusted_peer(&self, peer: PeerId) {
        self.relay.peers().mark_trusted(&peer);
        tracing::info!(peer = %peer, "marked peer as trusted");
    }

    /// Change the minimum proof-of-work and announce it to peers.
    pub async fn set_min_pow(&self, pow: f64) -> Result<()> {
        self.relay.set_min_pow(pow).await.map_err(|e| match e {
            RelayError::InvalidMessage(msg) => NodeError::InvalidParams(msg),
            other => other.into(),
        })
    }

    /// Push every pooled envelope the peer lacks.
    pub async fn sync_peer(&self, peer: &PeerId) -> Result<usize> {
        Ok(self.relay.sync_peer(peer).await?)
    }

    pub async fn info(&self) -> Result<NodeInfo> {
        let envelopes = self.store.envelopes().await?;
        Ok(NodeInfo {
            min_pow: self.relay.min_pow(),
            max_message_size: self.relay.max_message_size(),
            memory: envelopes.iter().map(|env| env.size()).sum(),
            messages: envelopes.len(),
        })
    }

    pub fn stats(&self) -> RelayStatsSnapshot {
        self.relay.stats()
    }
}

impl<S: Store, N: PeerNetwork> Drop for Node<S, N> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Per-peer worker tasks, keyed by the peer they serve.
struct PeerWorkers<S: Store, N: PeerNetwork> {
    relay: Arc<Relay<S, N>>,
    shutdown: CancellationToken,
    workers: HashMap<PeerId, mpsc::Sender<RelayMessage>>,
}

impl<S: Store + 'static, N: PeerNetwork + 'static> PeerWorkers<S, N> {
    fn new(relay: Arc<Relay<S, N>>, shutdown: CancellationToken) -> Self {
        Self {
            relay,
            shutdown,
            workers: HashMap::new(),
        }
    }

    fn len(&self) -> usize {
        self.workers.len()
    }

    /// Queue a message for the sender's worker without waiting on it.
    /// Returns false if the message was dropped.
    fn deliver(&mut self, from: PeerId, message: RelayMessage) -> bool {
        if self.workers.get(&from).map_or(true, |worker| worker.is_closed()) {
            let worker = spawn_peer_worker(Arc::clone(&self.relay), from, self.shutdown.child_token());
            self.workers.insert(from, worker);
        }
        let Some(worker) = self.workers.get(&from) else {
            return false;
        };

        match worker.try_send(message) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(peer = %from, "peer queue full, dropping message");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!(peer = %from, "peer worker gone, dropping message");
                self.workers.remove(&from);
                false
            }
        }
    }

    /// Stop the workers of peers that are no longer connected.
    /// Returns how many were stopped.
    async fn prune(&mut self) -> usize {
        let connected: Vec<PeerId> = self
            .relay
            .network()
            .connected_peers()
            .await
            .into_iter()
            .map(|info| info.id)
            .collect();
        let before = self.workers.len();
        // Dropping the sender lets the worker drain its queue and exit.
        self.workers.retain(|peer, _| connected.contains(peer));
        let pruned = before - self.workers.len();
        if pruned > 0 {
            tracing::debug!(pruned, "stopped workers of disconnected peers");
        }
        pruned
    }
}

/// Read the transport and hand each message to its peer's worker.
async fn dispatch<S, N>(relay: Arc<Relay<S, N>>, prune_period: Duration, shutdown: CancellationToken)
where
    S: Store + 'static,
    N: PeerNetwork + 'static,
{
    let mut workers = PeerWorkers::new(Arc::clone(&relay), shutdown.clone());
    let mut prune = tokio::time::interval(prune_period);
    prune.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        let received = tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = prune.tick() => {
                workers.prune().await;
                continue;
            }
            received = relay.network().recv() => received,
        };

        match received {
            Ok((from, message)) => {
                workers.deliver(from, message);
            }
            Err(RelayError::InvalidMessage(reason)) => {
                tracing::warn!(reason, "dropping undecodable message");
            }
            Err(e) => {
                tracing::warn!(error = %e, "transport closed, dispatcher exiting");
                break;
            }
        }
    }
}

/// One task per peer keeps that peer's messages in order.
fn spawn_peer_worker<S, N>(
    relay: Arc<Relay<S, N>>,
    peer: PeerId,
    cancel: CancellationToken,
) -> mpsc::Sender<RelayMessage>
where
    S: Store + 'static,
    N: PeerNetwork + 'static,
{
    let (tx, mut rx) = mpsc::channel(PEER_QUEUE);
    tokio::spawn(async move {
        tracing::debug!(peer = %peer, "peer worker started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                message = rx.recv() => match message {
                    Some(message) => relay.handle_message(peer, message).await,
                    None => break,
                },
            }
        }
        tracing::debug!(peer = %peer, "peer worker stopped");
    });
    tx
}

async fn sweep<S, N>(relay: Arc<Relay<S, N>>, period: Duration, shutdown: CancellationToken)
where
    S: Store + 'static,
    N: PeerNetwork + 'static,
{
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {
                if let Err(e) = relay.sweep().await {
                    tracing::warn!(error = %e, "expiry sweep failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hush_relay::{MemoryNetwork, MemoryTransport, PeerRole};

    async fn node(network: &Arc<MemoryNetwork>) -> Node<MemoryStore, MemoryTransport> {
        let transport = network.create_transport(PeerId::random(), PeerRole::Full).await;
        Node::in_memory(NodeConfig::default(), transport).unwrap()
    }

    #[tokio::test]
    async fn test_workers_of_departed_peers_are_pruned() {
        let network = MemoryNetwork::new();
        let local = node(&network).await;
        let remote = node(&network).await;
        network.connect(local.peer_id(), remote.peer_id()).await;

        let mut workers = PeerWorkers::new(Arc::clone(local.relay()), CancellationToken::new());
        assert!(workers.deliver(remote.peer_id(), RelayMessage::PowRequirement(1.0)));
        assert!(workers.deliver(PeerId::random(), RelayMessage::PowRequirement(1.0)));
        assert_eq!(workers.len(), 2);

        assert_eq!(workers.prune().await, 1);
        assert_eq!(workers.len(), 1);

        network.disconnect(local.peer_id(), remote.peer_id()).await;
        assert_eq!(workers.prune().await, 1);
        assert_eq!(workers.len(), 0);
    }

    #[tokio::test]
    async fn test_full_peer_queue_drops_instead_of_blocking() {
        let network = MemoryNetwork::new();
        let local = node(&network).await;
        let mut workers = PeerWorkers::new(Arc::clone(local.relay()), CancellationToken::new());

        // The worker task cannot run until this test yields.
        let noisy = PeerId::random();
        for _ in 0..PEER_QUEUE {
            assert!(workers.deliver(noisy, RelayMessage::PowRequirement(1.0)));
        }
        assert!(!workers.deliver(noisy, RelayMessage::PowRequirement(1.0)));

        let quiet = PeerId::random();
        assert!(workers.deliver(quiet, RelayMessage::PowRequirement(2.0)));
    }

    #[tokio::test]
    async fn test_closed_worker_is_replaced() {
        let network = MemoryNetwork::new();
        let local = node(&network).await;
        let shutdown = CancellationToken::new();
        let mut workers = PeerWorkers::new(Arc::clone(local.relay()), shutdown.clone());

        let peer = PeerId::random();
        assert!(workers.deliver(peer, RelayMessage::PowRequirement(1.0)));
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        workers.workers.insert(peer, tx);

        assert!(workers.deliver(peer, RelayMessage::PowRequirement(2.0)));
        assert_eq!(workers.len(), 1);
        shutdown.cancel();
    }
}
