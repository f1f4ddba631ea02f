//! Transport abstraction for the relay.
//!
//! The relay only needs to know who is connected, in which role, and how to
//! exchange [`RelayMessage`]s with them. Handshakes, encryption of the link
//! and peer discovery belong to the implementation.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::messages::{PeerId, RelayMessage};
use crate::policy::PeerRole;

/// A connected peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerInfo {
    pub id: PeerId,
    pub role: PeerRole,
}

/// Peer network capability consumed by the relay.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait PeerNetwork: Send + Sync {
    /// Get the local peer's identity.
    fn local_peer_id(&self) -> PeerId;

    /// List currently connected peers.
    async fn connected_peers(&self) -> Vec<PeerInfo>;

    /// Send a message to a specific peer.
    async fn send(&self, peer: &PeerId, message: RelayMessage) -> Result<()>;

    /// Receive the next message from any peer.
    ///
    /// Blocks until a message is available or the network shuts down.
    async fn recv(&self) -> Result<(PeerId, RelayMessage)>;

    /// Receive with timeout.
    ///
    /// Returns None if timeout expires before a message arrives.
    async fn recv_timeout(&self, timeout: Duration) -> Result<Option<(PeerId, RelayMessage)>> {
        match tokio::time::timeout(timeout, self.recv()).await {
            Ok(result) => result.map(Some),
            Err(_) => Ok(None),
        }
    }

    /// Check if a specific peer is connected.
    async fn is_connected(&self, peer: &PeerId) -> bool {
        self.connected_peers().await.iter().any(|info| &info.id == peer)
    }
}

/// A simple in-memory mesh for testing.
///
/// Peers join with a role and exchange encoded messages over channels.
/// Links are explicit: two peers only see each other after [`MemoryNetwork::connect`].
pub mod memory {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::Arc;
    use tokio::sync::{mpsc, Mutex, RwLock};

    use crate::error::RelayError;

    /// Encoded message in flight.
    #[derive(Debug)]
    struct Frame {
        from: PeerId,
        bytes: Vec<u8>,
    }

    struct Member {
        role: PeerRole,
        sender: mpsc::Sender<Frame>,
    }

    /// Shared state for the memory mesh.
    #[derive(Default)]
    pub struct MemoryNetwork {
        members: RwLock<HashMap<PeerId, Member>>,
        links: RwLock<HashSet<(PeerId, PeerId)>>,
    }

    fn link(a: PeerId, b: PeerId) -> (PeerId, PeerId) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }

    impl MemoryNetwork {
        /// Create a new memory mesh.
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Create a transport for a new member of this mesh.
        pub async fn create_transport(self: &Arc<Self>, peer_id: PeerId, role: PeerRole) -> MemoryTransport {
            let (tx, rx) = mpsc::channel(1000);

            self.members
                .write()
                .await
                .insert(peer_id, Member { role, sender: tx });

            MemoryTransport {
                peer_id,
                network: Arc::clone(self),
                receiver: Mutex::new(rx),
            }
        }

        /// Link two members.
        pub async fn connect(&self, a: PeerId, b: PeerId) {
            if a != b {
                self.links.write().await.insert(link(a, b));
            }
        }

        /// Drop the link between two members.
        pub async fn disconnect(&self, a: PeerId, b: PeerId) {
            self.links.write().await.remove(&link(a, b));
        }

        /// Link every pair of members.
        pub async fn connect_all(&self) {
            let ids: Vec<PeerId> = self.members.read().await.keys().copied().collect();
            let mut links = self.links.write().await;
            for (i, a) in ids.iter().enumerate() {
                for b in &ids[i + 1..] {
                    links.insert(link(*a, *b));
                }
            }
        }

        async fn linked(&self, a: PeerId, b: PeerId) -> bool {
            self.links.read().await.contains(&link(a, b))
        }
    }

    /// In-memory transport implementation.
    pub struct MemoryTransport {
        peer_id: PeerId,
        network: Arc<MemoryNetwork>,
        receiver: Mutex<mpsc::Receiver<Frame>>,
    }

    #[async_trait]
    impl PeerNetwork for MemoryTransport {
        fn local_peer_id(&self) -> PeerId {
            self.peer_id
        }

        async fn connected_peers(&self) -> Vec<PeerInfo> {
            let links = self.network.links.read().await;
            let members = self.network.members.read().await;
            let mut peers: Vec<PeerInfo> = members
                .iter()
                .filter(|(id, _)| **id != self.peer_id && links.contains(&link(self.peer_id, **id)))
                .map(|(id, member)| PeerInfo { id: *id, role: member.role })
                .collect();
            peers.sort_by_key(|info| info.id);
            peers
        }

        async fn send(&self, peer: &PeerId, message: RelayMessage) -> Result<()> {
            if !self.network.linked(self.peer_id, *peer).await {
                return Err(RelayError::PeerNotConnected(*peer));
            }
            let sender = match self.network.members.read().await.get(peer) {
                Some(member) => member.sender.clone(),
                None => return Err(RelayError::Transport("peer not found".into())),
            };
            let frame = Frame {
                from: self.peer_id,
                bytes: message.to_bytes()?,
            };
            sender
                .send(frame)
                .await
                .map_err(|_| RelayError::Transport("peer disconnected".into()))
        }

        async fn recv(&self) -> Result<(PeerId, RelayMessage)> {
            let mut rx = self.receiver.lock().await;
            match rx.recv().await {
                Some(frame) => Ok((frame.from, RelayMessage::from_bytes(&frame.bytes)?)),
                None => Err(RelayError::Transport("channel closed".into())),
            }
        }
    }
}
