//! Filters: subscriptions with a bounded queue of matched messages.

use std::collections::{HashSet, VecDeque};

use parking_lot::Mutex;

use hush_core::{now_secs, try_decrypt, DecryptionKey, Envelope, OpenedMessage, Topic};

use crate::ids::{FilterId, KeyId};

/// How an envelope reached this node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Through the relay mesh.
    Relayed,
    /// Sent directly by a trusted peer, outside relay.
    Direct,
}

/// Which registry key a filter decrypts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKey {
    Symmetric(KeyId),
    Private(KeyId),
}

impl FilterKey {
    /// The referenced key id.
    pub fn id(&self) -> KeyId {
        match self {
            FilterKey::Symmetric(id) | FilterKey::Private(id) => *id,
        }
    }
}

/// A filter registration request.
#[derive(Debug, Clone)]
pub struct FilterSpec {
    pub key: FilterKey,
    pub topics: Vec<Topic>,
    pub allow_p2p: bool,
    pub min_pow: f64,
}

impl FilterSpec {
    /// Relayed-only filter with no PoW floor.
    pub fn new(key: FilterKey, topics: Vec<Topic>) -> Self {
        Self {
            key,
            topics,
            allow_p2p: false,
            min_pow: 0.0,
        }
    }

    /// Also accept direct messages from trusted peers.
    pub fn allow_p2p(mut self, allow: bool) -> Self {
        self.allow_p2p = allow;
        self
    }

    /// Ignore envelopes below this proof-of-work.
    pub fn min_pow(mut self, min_pow: f64) -> Self {
        self.min_pow = min_pow;
        self
    }
}

/// A decrypted message waiting in a filter queue.
#[derive(Debug, Clone)]
pub struct MatchedMessage {
    pub opened: OpenedMessage,
    /// Unix seconds when the message was matched locally.
    pub arrived_at: u64,
    /// Whether the envelope came directly from a trusted peer.
    pub direct: bool,
}

/// A registered filter.
///
/// Key material is resolved once at registration; deleting the key from the
/// registry afterwards does not affect the filter.
pub struct Filter {
    id: FilterId,
    key: DecryptionKey,
    topics: HashSet<Topic>,
    allow_p2p: bool,
    min_pow: f64,
    queue: Mutex<VecDeque<MatchedMessage>>,
    capacity: usize,
}

impl Filter {
    pub(crate) fn new(id: FilterId, key: DecryptionKey, spec: &FilterSpec, capacity: usize) -> Self {
        Self {
            id,
            key,
            topics: spec.topics.iter().copied().collect(),
            allow_p2p: spec.allow_p2p,
            min_pow: spec.min_pow,
            queue: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn id(&self) -> FilterId {
        self.id
    }

    pub fn topics(&self) -> &HashSet<Topic> {
        &self.topics
    }

    pub fn allow_p2p(&self) -> bool {
        self.allow_p2p
    }

    pub fn min_pow(&self) -> f64 {
        self.min_pow
    }

    /// Cheap checks that do not need decryption.
    pub fn accepts(&self, envelope: &Envelope, delivery: Delivery) -> bool {
        if delivery == Delivery::Direct && !self.allow_p2p {
            return false;
        }
        if !self.topics.contains(&envelope.topic) {
            return false;
        }
        self.min_pow <= 0.0 || envelope.pow() >= self.min_pow
    }

    /// Try to open the envelope and queue the result. Returns whether it matched.
    pub fn offer(&self, envelope: &Envelope, delivery: Delivery) -> bool {
        if !self.accepts(envelope, delivery) {
            return false;
        }
        let Some(opened) = try_decrypt(envelope, &self.key).opened() else {
            return false;
        };

        self.push(MatchedMessage {
            opened,
            arrived_at: now_secs(),
            direct: delivery == Delivery::Direct,
        });
        true
    }

    fn push(&self, message: MatchedMessage) {
        let mut queue = self.queue.lock();
        if queue.len() >= self.capacity {
            if let Some(dropped) = queue.pop_front() {
                tracing::warn!(
                    filter = %self.id,
                    envelope = %dropped.opened.envelope_id,
                    capacity = self.capacity,
                    "filter queue full, dropping oldest message"
                );
            }
        }
        queue.push_back(message);
    }

    /// Take all queued messages in arrival order.
    pub fn drain(&self) -> Vec<MatchedMessage> {
        std::mem::take(&mut *self.queue.lock()).into()
    }

    /// Number of queued messages.
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }
}

impl std::fmt::Debug for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Filter")
            .field("id", &self.id)
            .field("topics", &self.topics)
            .field("allow_p2p", &self.allow_p2p)
            .field("min_pow", &self.min_pow)
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}
