//! In-memory implementation of the Store trait.
//!
//! Entries expire on `tokio::time::Instant`, so tests can drive expiry
//! with a paused clock.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::time::Instant;

use hush_core::{Envelope, EnvelopeId};

use crate::error::Result;
use crate::traits::{InsertResult, Store};

/// Bounded in-memory store.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock:
/// dedup lookups share the read lock, admissions take the write lock.
pub struct MemoryStore {
    capacity: usize,
    inner: RwLock<HashMap<EnvelopeId, StoredEntry>>,
}

struct StoredEntry {
    /// Present for envelopes in the pool, absent for bare seen-marks.
    envelope: Option<Envelope>,
    expires_at: Instant,
}

impl StoredEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

impl MemoryStore {
    /// Create an empty store holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: RwLock::new(HashMap::new()),
        }
    }

    fn admit(&self, id: &EnvelopeId, envelope: Option<&Envelope>, ttl: Duration) -> InsertResult {
        let now = Instant::now();
        let mut entries = self.inner.write();

        match entries.get(id).map(|entry| entry.is_live(now)) {
            Some(true) => {
                if let Some(entry) = entries.get_mut(id) {
                    if entry.envelope.is_none() {
                        entry.envelope = envelope.cloned();
                    }
                }
                return InsertResult::AlreadySeen;
            }
            Some(false) => {
                // Expired: the identity may be admitted again.
                entries.remove(id);
            }
            None => {}
        }

        if entries.len() >= self.capacity {
            let before = entries.len();
            entries.retain(|_, entry| entry.is_live(now));
            tracing::debug!(evicted = before - entries.len(), "store full, swept expired");
            if entries.len() >= self.capacity {
                tracing::warn!(capacity = self.capacity, "store at capacity, dropping {}", id);
                return InsertResult::Full;
            }
        }

        entries.insert(
            *id,
            StoredEntry {
                envelope: envelope.cloned(),
                expires_at: now + ttl,
            },
        );
        InsertResult::Inserted
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(65_536)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn seen(&self, id: &EnvelopeId) -> Result<bool> {
        let now = Instant::now();
        let entries = self.inner.read();
        Ok(entries.get(id).map_or(false, |entry| entry.is_live(now)))
    }

    async fn mark_seen(&self, id: &EnvelopeId, ttl: Duration) -> Result<InsertResult> {
        Ok(self.admit(id, None, ttl))
    }

    async fn insert_envelope(&self, envelope: &Envelope, ttl: Duration) -> Result<InsertResult> {
        Ok(self.admit(&envelope.id(), Some(envelope), ttl))
    }

    async fn get_envelope(&self, id: &EnvelopeId) -> Result<Option<Envelope>> {
        let now = Instant::now();
        let entries = self.inner.read();
        Ok(entries
            .get(id)
            .filter(|entry| entry.is_live(now))
            .and_then(|entry| entry.envelope.clone()))
    }

    async fn envelopes(&self) -> Result<Vec<Envelope>> {
        let now = Instant::now();
        let entries = self.inner.read();
        Ok(entries
            .values()
            .filter(|entry| entry.is_live(now))
            .filter_map(|entry| entry.envelope.clone())
            .collect())
    }

    async fn sweep_expired(&self) -> Result<usize> {
        let now = Instant::now();
        let mut entries = self.inner.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        Ok(before - entries.len())
    }

    async fn len(&self) -> Result<usize> {
        let now = Instant::now();
        let entries = self.inner.read();
        Ok(entries.values().filter(|entry| entry.is_live(now)).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use hush_core::{now_secs, Topic};

    fn envelope(nonce: u64) -> Envelope {
        Envelope {
            timestamp: now_secs(),
            ttl: 50,
            topic: Topic::derive(b"store"),
            data: Bytes::from_static(b"data"),
            nonce,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_seen_until_ttl_elapses() {
        let store = MemoryStore::new(16);
        let id = EnvelopeId::from_bytes([1; 32]);

        assert!(!store.seen(&id).await.unwrap());
        store.mark_seen(&id, Duration::from_secs(10)).await.unwrap();
        assert!(store.seen(&id).await.unwrap());

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(store.seen(&id).await.unwrap());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!store.seen(&id).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_then_readmission_after_expiry() {
        let store = MemoryStore::new(16);
        let id = EnvelopeId::from_bytes([2; 32]);
        let ttl = Duration::from_secs(5);

        assert_eq!(store.mark_seen(&id, ttl).await.unwrap(), InsertResult::Inserted);
        assert_eq!(store.mark_seen(&id, ttl).await.unwrap(), InsertResult::AlreadySeen);

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(store.mark_seen(&id, ttl).await.unwrap(), InsertResult::Inserted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_sweeps_before_refusing() {
        let store = MemoryStore::new(2);
        let short = Duration::from_secs(1);
        let long = Duration::from_secs(100);

        store.mark_seen(&EnvelopeId::from_bytes([1; 32]), short).await.unwrap();
        store.mark_seen(&EnvelopeId::from_bytes([2; 32]), long).await.unwrap();
        assert_eq!(
            store.mark_seen(&EnvelopeId::from_bytes([3; 32]), long).await.unwrap(),
            InsertResult::Full
        );

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(
            store.mark_seen(&EnvelopeId::from_bytes([3; 32]), long).await.unwrap(),
            InsertResult::Inserted
        );
        assert_eq!(store.len().await.unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_envelope_pool_and_sweep() {
        let store = MemoryStore::new(16);
        let a = envelope(1);
        let b = envelope(2);

        store.insert_envelope(&a, Duration::from_secs(5)).await.unwrap();
        store.insert_envelope(&b, Duration::from_secs(50)).await.unwrap();
        assert_eq!(store.get_envelope(&a.id()).await.unwrap(), Some(a.clone()));
        assert_eq!(store.envelopes().await.unwrap().len(), 2);

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(store.get_envelope(&a.id()).await.unwrap(), None);
        assert_eq!(store.sweep_expired().await.unwrap(), 1);
        assert_eq!(store.envelopes().await.unwrap(), vec![b]);
    }

    #[tokio::test]
    async fn test_seen_mark_upgraded_with_envelope() {
        let store = MemoryStore::new(16);
        let env = envelope(7);
        store.mark_seen(&env.id(), Duration::from_secs(50)).await.unwrap();
        assert_eq!(
            store.insert_envelope(&env, Duration::from_secs(50)).await.unwrap(),
            InsertResult::AlreadySeen
        );
        assert_eq!(store.get_envelope(&env.id()).await.unwrap(), Some(env));
    }
}
