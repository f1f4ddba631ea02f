//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: nodes on an in-memory mesh,
//! and envelopes sealed without a node.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use hush::{MessageView, Node, NodeConfig, ShhApi};
use hush_core::{seal, EncryptionTarget, Envelope, SealParams, SymmetricKey, Topic};
use hush_relay::{MemoryNetwork, MemoryTransport, PeerId, PeerRole};
use hush_store::MemoryStore;

/// API over the in-memory stack.
pub type TestApi = ShhApi<MemoryStore, MemoryTransport>;

/// One started node of a [`TestMesh`].
pub struct TestNode {
    pub node: Arc<Node<MemoryStore, MemoryTransport>>,
    pub api: TestApi,
}

impl TestNode {
    pub fn peer_id(&self) -> PeerId {
        self.node.peer_id()
    }
}

/// Nodes on a shared in-memory network. Nothing is linked until
/// [`TestMesh::connect`] or [`TestMesh::connect_all`].
pub struct TestMesh {
    pub network: Arc<MemoryNetwork>,
    pub nodes: Vec<TestNode>,
}

impl TestMesh {
    /// Start one node per role with the default configuration.
    pub async fn new(roles: &[PeerRole]) -> Self {
        Self::with_config(roles, NodeConfig::default()).await
    }

    /// Start one node per role; each node's role overrides `config.relay.role`.
    pub async fn with_config(roles: &[PeerRole], config: NodeConfig) -> Self {
        let network = MemoryNetwork::new();
        let mut nodes = Vec::with_capacity(roles.len());
        for role in roles {
            let transport = network.create_transport(PeerId::random(), *role).await;
            let mut config = config.clone();
            config.relay.role = *role;
            let node = match Node::in_memory(config, transport) {
                Ok(node) => Arc::new(node),
                Err(e) => panic!("invalid test config: {e}"),
            };
            node.start();
            let api = ShhApi::new(Arc::clone(&node));
            nodes.push(TestNode { node, api });
        }
        Self { network, nodes }
    }

    pub fn api(&self, index: usize) -> &TestApi {
        &self.nodes[index].api
    }

    /// Link nodes `a` and `b`.
    pub async fn connect(&self, a: usize, b: usize) {
        self.network
            .connect(self.nodes[a].peer_id(), self.nodes[b].peer_id())
            .await;
    }

    /// Link every pair of nodes.
    pub async fn connect_all(&self) {
        self.network.connect_all().await;
    }

    /// Stop every node.
    pub async fn shutdown(&self) {
        for node in &self.nodes {
            node.node.stop().await;
        }
    }
}

/// Poll a filter until `expected` messages arrived or `timeout` passes.
pub async fn wait_for_messages(
    api: &TestApi,
    filter: &str,
    expected: usize,
    timeout: Duration,
) -> Vec<MessageView> {
    let deadline = tokio::time::Instant::now() + timeout;
    let mut messages = Vec::new();
    loop {
        match api.get_filter_messages(filter) {
            Ok(batch) => messages.extend(batch),
            Err(e) => panic!("polling filter {filter}: {e}"),
        }
        if messages.len() >= expected || tokio::time::Instant::now() >= deadline {
            return messages;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Seal `payload` for `key` without proof-of-work.
pub fn seal_quick(key: &SymmetricKey, topic: Topic, payload: &[u8]) -> Envelope {
    let params = SealParams::new(payload.to_vec(), topic, EncryptionTarget::Symmetric(key.clone()));
    match seal(params, &CancellationToken::new()) {
        Ok(envelope) => envelope,
        Err(e) => panic!("sealing test envelope: {e}"),
    }
}
