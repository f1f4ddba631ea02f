//! Filter matching engine.
//!
//! Every accepted envelope is offered to every filter whose topics it
//! carries. Matching is non-exclusive: one envelope can land in many
//! filters, one per key that opens it.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use hush_core::{DecryptionKey, Envelope};

use crate::error::{FilterError, Result};
use crate::filter::{Delivery, Filter, FilterKey, FilterSpec, MatchedMessage};
use crate::ids::FilterId;
use crate::keys::KeyRegistry;

/// The set of registered filters of one node.
#[derive(Debug)]
pub struct FilterEngine {
    keys: Arc<KeyRegistry>,
    filters: RwLock<HashMap<FilterId, Arc<Filter>>>,
    queue_capacity: usize,
}

impl FilterEngine {
    /// Create an engine resolving keys from `keys`. Each filter queues at
    /// most `queue_capacity` messages.
    pub fn new(keys: Arc<KeyRegistry>, queue_capacity: usize) -> Self {
        Self {
            keys,
            filters: RwLock::new(HashMap::new()),
            queue_capacity,
        }
    }

    /// The key registry filters resolve against.
    pub fn keys(&self) -> &Arc<KeyRegistry> {
        &self.keys
    }

    /// Register a filter.
    pub fn register(&self, spec: FilterSpec) -> Result<FilterId> {
        if spec.topics.is_empty() {
            return Err(FilterError::InvalidFilter("at least one topic is required".into()));
        }
        if !spec.min_pow.is_finite() || spec.min_pow < 0.0 {
            return Err(FilterError::InvalidFilter(format!(
                "invalid min pow: {}",
                spec.min_pow
            )));
        }

        let key = match spec.key {
            FilterKey::Symmetric(id) => self
                .keys
                .symmetric_key(&id)
                .map(DecryptionKey::Symmetric),
            FilterKey::Private(id) => self.keys.key_pair(&id).map(DecryptionKey::Private),
        }
        .map_err(|_| FilterError::InvalidFilter(format!("no such key: {}", spec.key.id())))?;

        let id = FilterId::random();
        let filter = Arc::new(Filter::new(id, key, &spec, self.queue_capacity));
        self.filters.write().insert(id, filter);

        tracing::debug!(filter = %id, topics = spec.topics.len(), allow_p2p = spec.allow_p2p, "registered filter");
        Ok(id)
    }

    /// Remove a filter. Returns whether it existed.
    pub fn unregister(&self, id: &FilterId) -> bool {
        let removed = self.filters.write().remove(id).is_some();
        if removed {
            tracing::debug!(filter = %id, "unregistered filter");
        }
        removed
    }

    /// Offer an envelope to all filters. Returns the number that matched.
    pub fn on_envelope(&self, envelope: &Envelope, delivery: Delivery) -> usize {
        // Decryption is the expensive part; do it without holding the map lock.
        let candidates: Vec<Arc<Filter>> = self
            .filters
            .read()
            .values()
            .filter(|f| f.accepts(envelope, delivery))
            .cloned()
            .collect();

        let matched = candidates
            .iter()
            .filter(|f| f.offer(envelope, delivery))
            .count();

        if matched > 0 {
            tracing::debug!(envelope = %envelope.id(), topic = %envelope.topic, matched, "envelope matched filters");
        }
        matched
    }

    /// Drain the queue of a filter in arrival order.
    pub fn poll(&self, id: &FilterId) -> Result<std::vec::IntoIter<MatchedMessage>> {
        let filter = self
            .filters
            .read()
            .get(id)
            .cloned()
            .ok_or(FilterError::FilterNotFound(*id))?;
        Ok(filter.drain().into_iter())
    }

    /// Look up a filter.
    pub fn get(&self, id: &FilterId) -> Option<Arc<Filter>> {
        self.filters.read().get(id).cloned()
    }

    /// Number of registered filters.
    pub fn len(&self) -> usize {
        self.filters.read().len()
    }

    /// Whether no filters are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
