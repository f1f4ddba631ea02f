//! Cryptographic primitives for Hush.
//!
//! Provides ChaCha20-Poly1305 authenticated encryption, X25519 key agreement
//! for encrypt-to-public-key, Ed25519 message signatures and Argon2id
//! passphrase derivation.

use argon2::Argon2;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};

use crate::error::{CoreError, Result};

/// Length of a ChaCha20-Poly1305 nonce.
pub const NONCE_LEN: usize = 12;

/// Length of a ChaCha20-Poly1305 authentication tag.
pub const TAG_LEN: usize = 16;

/// Salt used for passphrase derivation.
///
/// Fixed so that every node deriving from the same passphrase ends up with
/// the same key.
const PASSPHRASE_SALT: &[u8] = b"hush-symmetric-key-v1";

/// Context for deriving the asymmetric wrapping key from an ECDH secret.
const ASYMMETRIC_CONTEXT: &str = "hush asymmetric envelope v1";

/// Context for deriving the signing seed from a key pair seed.
const SIGNING_CONTEXT: &str = "hush signing key v1";

/// A 256-bit symmetric key for ChaCha20-Poly1305.
#[derive(Clone, PartialEq, Eq)]
pub struct SymmetricKey([u8; 32]);

impl SymmetricKey {
    /// Generate a new random key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Create from a slice, which must be exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| {
            CoreError::InvalidKey(format!("symmetric key must be 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(arr))
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Encrypt with a fresh random nonce.
    ///
    /// Output layout: `nonce || ciphertext`.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|e| CoreError::EncryptionError(e.to_string()))?;

        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|e| CoreError::EncryptionError(e.to_string()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Decrypt `nonce || ciphertext`.
    ///
    /// Returns `None` when the data was not sealed under this key.
    pub fn decrypt(&self, data: &[u8]) -> Option<Vec<u8>> {
        if data.len() < NONCE_LEN + TAG_LEN {
            return None;
        }
        let cipher = ChaCha20Poly1305::new_from_slice(&self.0).ok()?;
        let (nonce, ciphertext) = data.split_at(NONCE_LEN);
        cipher.decrypt(Nonce::from_slice(nonce), ciphertext).ok()
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(..)")
    }
}

/// Derive a symmetric key from a human-supplied passphrase.
///
/// Argon2id with default parameters and a fixed salt: deterministic across
/// nodes, expensive to brute force.
pub fn derive_symmetric_key(passphrase: &str) -> Result<SymmetricKey> {
    let mut out = [0u8; 32];
    Argon2::default()
        .hash_password_into(passphrase.as_bytes(), PASSPHRASE_SALT, &mut out)
        .map_err(|e| CoreError::KeyDerivationError(e.to_string()))?;
    Ok(SymmetricKey(out))
}

/// An X25519 public key (32 bytes), the shareable half of a [`KeyPair`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct X25519PublicKey(pub [u8; 32]);

impl X25519PublicKey {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Create from a slice, which must be exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| {
            CoreError::InvalidKey(format!("public key must be 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(arr))
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Encrypt to this public key.
    ///
    /// A fresh ephemeral secret is agreed with the recipient and the shared
    /// secret is stretched into a one-time ChaCha20-Poly1305 key.
    /// Output layout: `ephemeral_public || nonce || ciphertext`.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let ephemeral = EphemeralSecret::random_from_rng(rand::thread_rng());
        let ephemeral_public = PublicKey::from(&ephemeral);
        let shared = ephemeral.diffie_hellman(&PublicKey::from(self.0));

        let key = wrapping_key(shared.as_bytes(), ephemeral_public.as_bytes(), &self.0);
        let sealed = key.encrypt(plaintext)?;

        let mut out = Vec::with_capacity(32 + sealed.len());
        out.extend_from_slice(ephemeral_public.as_bytes());
        out.extend_from_slice(&sealed);
        Ok(out)
    }
}

impl fmt::Debug for X25519PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "X25519Pub({})", &self.to_hex()[..16])
    }
}

impl From<PublicKey> for X25519PublicKey {
    fn from(pk: PublicKey) -> Self {
        Self(*pk.as_bytes())
    }
}

fn wrapping_key(shared: &[u8; 32], ephemeral: &[u8; 32], recipient: &[u8; 32]) -> SymmetricKey {
    let mut hasher = blake3::Hasher::new_derive_key(ASYMMETRIC_CONTEXT);
    hasher.update(shared);
    hasher.update(ephemeral);
    hasher.update(recipient);
    SymmetricKey(*hasher.finalize().as_bytes())
}

/// A 32-byte Ed25519 public key identifying the signer of a message.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ed25519PublicKey(pub [u8; 32]);

impl Ed25519PublicKey {
    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Verify a signature over a message.
    pub fn verify(&self, message: &[u8], signature: &[u8; 64]) -> Result<()> {
        let verifying_key = VerifyingKey::from_bytes(&self.0)
            .map_err(|_| CoreError::InvalidKey("invalid signing public key".into()))?;
        verifying_key
            .verify(message, &Signature::from_bytes(signature))
            .map_err(|_| CoreError::InvalidKey("signature verification failed".into()))
    }
}

impl fmt::Debug for Ed25519PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519Pub({})", &self.to_hex()[..16])
    }
}

/// An asymmetric key pair.
///
/// Holds an X25519 secret for receiving encrypted envelopes and an Ed25519
/// key, derived from the same seed, for signing outgoing messages.
#[derive(Clone)]
pub struct KeyPair {
    secret: StaticSecret,
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generate a new random key pair.
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut seed);
        Self::from_seed(&seed)
    }

    /// Create from a 32-byte seed (imported secret material).
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_seed = blake3::derive_key(SIGNING_CONTEXT, seed);
        Self {
            secret: StaticSecret::from(*seed),
            signing_key: SigningKey::from_bytes(&signing_seed),
        }
    }

    /// Create from a slice, which must be exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let seed: [u8; 32] = bytes.try_into().map_err(|_| {
            CoreError::InvalidKey(format!("private key must be 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Self::from_seed(&seed))
    }

    /// The public encryption key.
    pub fn public_key(&self) -> X25519PublicKey {
        X25519PublicKey::from(PublicKey::from(&self.secret))
    }

    /// The public signing key.
    pub fn signing_public_key(&self) -> Ed25519PublicKey {
        Ed25519PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }

    /// Decrypt data produced by [`X25519PublicKey::encrypt`] for this key.
    ///
    /// Returns `None` when the data was not sealed for this key.
    pub fn decrypt(&self, data: &[u8]) -> Option<Vec<u8>> {
        if data.len() < 32 {
            return None;
        }
        let (ephemeral, sealed) = data.split_at(32);
        let ephemeral: [u8; 32] = ephemeral.try_into().ok()?;
        let shared = self.secret.diffie_hellman(&PublicKey::from(ephemeral));
        let key = wrapping_key(shared.as_bytes(), &ephemeral, self.public_key().as_bytes());
        key.decrypt(sealed)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyPair({:?})", self.public_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symmetric_encrypt_decrypt() {
        let key = SymmetricKey::generate();
        let sealed = key.encrypt(b"hello, world!").unwrap();
        assert_ne!(&sealed[NONCE_LEN..], b"hello, world!");
        assert_eq!(key.decrypt(&sealed).unwrap(), b"hello, world!");
    }

    #[test]
    fn test_symmetric_wrong_key_is_none() {
        let sealed = SymmetricKey::generate().encrypt(b"secret").unwrap();
        assert!(SymmetricKey::generate().decrypt(&sealed).is_none());
        assert!(SymmetricKey::generate().decrypt(&[0u8; 4]).is_none());
    }

    #[test]
    fn test_passphrase_derivation_is_deterministic() {
        let k1 = derive_symmetric_key("some password").unwrap();
        let k2 = derive_symmetric_key("some password").unwrap();
        let k3 = derive_symmetric_key("other password").unwrap();
        assert_eq!(k1, k2);
        assert_ne!(k1, k3);
    }

    #[test]
    fn test_empty_passphrase_derives_a_key() {
        let empty = derive_symmetric_key("").unwrap();
        assert_eq!(empty, derive_symmetric_key("").unwrap());
        assert_ne!(empty, derive_symmetric_key("some password").unwrap());
    }

    #[test]
    fn test_asymmetric_roundtrip() {
        let bob = KeyPair::generate();
        let sealed = bob.public_key().encrypt(b"for bob").unwrap();
        assert_eq!(bob.decrypt(&sealed).unwrap(), b"for bob");

        let eve = KeyPair::generate();
        assert!(eve.decrypt(&sealed).is_none());
    }

    #[test]
    fn test_keypair_deterministic_from_seed() {
        let kp1 = KeyPair::from_seed(&[0x42; 32]);
        let kp2 = KeyPair::from_seed(&[0x42; 32]);
        assert_eq!(kp1.public_key(), kp2.public_key());
        assert_eq!(kp1.signing_public_key(), kp2.signing_public_key());
    }

    #[test]
    fn test_sign_verify() {
        let kp = KeyPair::generate();
        let sig = kp.sign(b"message");
        kp.signing_public_key().verify(b"message", &sig).unwrap();
        assert!(kp.signing_public_key().verify(b"messagE", &sig).is_err());
    }
}
