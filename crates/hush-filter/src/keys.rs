//! Key registry.
//!
//! Holds symmetric keys and key pairs behind opaque [`KeyId`] handles.
//! Secret material is handed out only to in-process components (sealing
//! and filters); the boundary only ever exposes public keys.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use hush_core::{derive_symmetric_key, DecryptionKey, KeyPair, SymmetricKey, X25519PublicKey};

use crate::error::{FilterError, Result};
use crate::ids::KeyId;

/// Key material stored in the registry.
#[derive(Debug, Clone)]
pub enum KeyMaterial {
    Symmetric(SymmetricKey),
    Pair(KeyPair),
}

/// Registry of keys shared by every task of a node.
#[derive(Debug, Default)]
pub struct KeyRegistry {
    keys: RwLock<HashMap<KeyId, Arc<KeyMaterial>>>,
}

impl KeyRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, material: KeyMaterial) -> KeyId {
        let id = KeyId::random();
        self.keys.write().insert(id, Arc::new(material));
        id
    }

    fn get(&self, id: &KeyId) -> Option<Arc<KeyMaterial>> {
        self.keys.read().get(id).cloned()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Symmetric keys
    // ─────────────────────────────────────────────────────────────────────────

    /// Generate and store a random symmetric key.
    pub fn generate_symmetric_key(&self) -> KeyId {
        self.insert(KeyMaterial::Symmetric(SymmetricKey::generate()))
    }

    /// Store an existing symmetric key.
    pub fn add_symmetric_key(&self, key: SymmetricKey) -> KeyId {
        self.insert(KeyMaterial::Symmetric(key))
    }

    /// Derive a symmetric key from a passphrase and store it.
    pub fn add_symmetric_key_from_passphrase(&self, passphrase: &str) -> Result<KeyId> {
        let key = derive_symmetric_key(passphrase)?;
        Ok(self.add_symmetric_key(key))
    }

    /// Fetch a symmetric key.
    pub fn symmetric_key(&self, id: &KeyId) -> Result<SymmetricKey> {
        match self.get(id).as_deref() {
            Some(KeyMaterial::Symmetric(key)) => Ok(key.clone()),
            _ => Err(FilterError::KeyNotFound(*id)),
        }
    }

    /// Whether `id` names a symmetric key.
    pub fn has_symmetric_key(&self, id: &KeyId) -> bool {
        matches!(self.get(id).as_deref(), Some(KeyMaterial::Symmetric(_)))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Key pairs
    // ─────────────────────────────────────────────────────────────────────────

    /// Generate and store a random key pair.
    pub fn generate_key_pair(&self) -> KeyId {
        self.insert(KeyMaterial::Pair(KeyPair::generate()))
    }

    /// Store an imported key pair.
    pub fn add_key_pair(&self, pair: KeyPair) -> KeyId {
        self.insert(KeyMaterial::Pair(pair))
    }

    /// Fetch a key pair.
    pub fn key_pair(&self, id: &KeyId) -> Result<KeyPair> {
        match self.get(id).as_deref() {
            Some(KeyMaterial::Pair(pair)) => Ok(pair.clone()),
            _ => Err(FilterError::KeyNotFound(*id)),
        }
    }

    /// Public half of a key pair. Fails for unknown and symmetric ids.
    pub fn public_key(&self, id: &KeyId) -> Result<X25519PublicKey> {
        self.key_pair(id).map(|pair| pair.public_key())
    }

    /// Whether `id` names a key pair.
    pub fn has_key_pair(&self, id: &KeyId) -> bool {
        matches!(self.get(id).as_deref(), Some(KeyMaterial::Pair(_)))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Common
    // ─────────────────────────────────────────────────────────────────────────

    /// Key material usable for opening envelopes.
    pub fn decryption_key(&self, id: &KeyId) -> Result<DecryptionKey> {
        match self.get(id).as_deref() {
            Some(KeyMaterial::Symmetric(key)) => Ok(DecryptionKey::Symmetric(key.clone())),
            Some(KeyMaterial::Pair(pair)) => Ok(DecryptionKey::Private(pair.clone())),
            None => Err(FilterError::KeyNotFound(*id)),
        }
    }

    /// Whether `id` names any key.
    pub fn has_key(&self, id: &KeyId) -> bool {
        self.keys.read().contains_key(id)
    }

    /// Remove a key. Returns whether it was present; removing twice is a no-op.
    pub fn remove_key(&self, id: &KeyId) -> bool {
        self.keys.write().remove(id).is_some()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
