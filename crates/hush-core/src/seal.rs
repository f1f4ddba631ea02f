//! Sealing and opening envelopes.
//!
//! Inside the ciphertext, the payload is framed as CBOR together with
//! random padding (to hide the payload length) and an optional signature.

use std::time::Duration;

use bytes::Bytes;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::crypto::{Ed25519PublicKey, KeyPair, SymmetricKey, X25519PublicKey};
use crate::envelope::Envelope;
use crate::error::{CoreError, Result};
use crate::pow::{required_bits, PowSearch};
use crate::topic::Topic;
use crate::types::{now_secs, EnvelopeId};

/// Plaintext frames are padded up to a multiple of this many bytes.
pub const PADDING_BLOCK: usize = 256;

/// Default envelope lifetime in seconds.
pub const DEFAULT_TTL: u32 = 50;

/// Who an envelope is encrypted for.
#[derive(Debug, Clone)]
pub enum EncryptionTarget {
    /// Anyone holding the same symmetric key.
    Symmetric(SymmetricKey),
    /// The holder of the matching private key.
    PublicKey(X25519PublicKey),
}

/// Key material used to open envelopes.
#[derive(Debug, Clone)]
pub enum DecryptionKey {
    Symmetric(SymmetricKey),
    Private(KeyPair),
}

/// Parameters for [`seal`].
#[derive(Debug, Clone)]
pub struct SealParams {
    pub payload: Vec<u8>,
    pub topic: Topic,
    pub target: EncryptionTarget,
    pub signer: Option<KeyPair>,
    pub padding: Option<Vec<u8>>,
    pub ttl: u32,
    pub pow_target: f64,
    pub pow_time: Duration,
}

impl SealParams {
    /// Parameters with the default TTL and no proof-of-work.
    pub fn new(payload: impl Into<Vec<u8>>, topic: Topic, target: EncryptionTarget) -> Self {
        Self {
            payload: payload.into(),
            topic,
            target,
            signer: None,
            padding: None,
            ttl: DEFAULT_TTL,
            pow_target: 0.0,
            pow_time: Duration::ZERO,
        }
    }

    /// Set the time to live in seconds.
    pub fn ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the proof-of-work target and search budget.
    pub fn pow(mut self, target: f64, time: Duration) -> Self {
        self.pow_target = target;
        self.pow_time = time;
        self
    }

    /// Sign the payload with this key pair.
    pub fn signer(mut self, signer: KeyPair) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Use caller-supplied padding instead of random padding.
    pub fn padding(mut self, padding: Vec<u8>) -> Self {
        self.padding = Some(padding);
        self
    }
}

#[derive(Serialize, Deserialize)]
struct Frame {
    payload: Bytes,
    padding: Bytes,
    signature: Option<FrameSignature>,
}

#[derive(Serialize, Deserialize)]
struct FrameSignature {
    public_key: [u8; 32],
    signature: Bytes,
}

/// A successfully opened envelope.
#[derive(Debug, Clone)]
pub struct OpenedMessage {
    pub payload: Bytes,
    pub padding: Bytes,
    /// Signing key of the author, if the message was signed.
    pub signer: Option<Ed25519PublicKey>,
    /// Our public key, if the envelope was encrypted to it.
    pub recipient: Option<X25519PublicKey>,
    pub topic: Topic,
    pub timestamp: u64,
    pub ttl: u32,
    pub pow: f64,
    pub envelope_id: EnvelopeId,
}

/// Outcome of [`try_decrypt`].
///
/// A key mismatch is an ordinary outcome while scanning filters, not an error.
#[derive(Debug, Clone)]
pub enum DecryptOutcome {
    Opened(OpenedMessage),
    NoMatch,
}

impl DecryptOutcome {
    /// Convert into an `Option`.
    pub fn opened(self) -> Option<OpenedMessage> {
        match self {
            DecryptOutcome::Opened(msg) => Some(msg),
            DecryptOutcome::NoMatch => None,
        }
    }
}

/// Encrypt a payload and stamp it with proof-of-work.
///
/// The nonce search stops at the target or when `pow_time` runs out; in the
/// latter case the cheapest-found envelope is returned anyway. Callers
/// decide whether that is good enough.
pub fn seal(params: SealParams, cancel: &CancellationToken) -> Result<Envelope> {
    if params.ttl == 0 {
        return Err(CoreError::InvalidInput("ttl must be positive".into()));
    }

    let plaintext = encode_frame(&params)?;
    let data = match &params.target {
        EncryptionTarget::Symmetric(key) => key.encrypt(&plaintext)?,
        EncryptionTarget::PublicKey(public) => public.encrypt(&plaintext)?,
    };

    let mut envelope = Envelope {
        timestamp: now_secs(),
        ttl: params.ttl,
        topic: params.topic,
        data: Bytes::from(data),
        nonce: 0,
    };

    let target_bits = required_bits(params.pow_target, envelope.size(), envelope.ttl);
    let (nonce, bits) =
        PowSearch::new(envelope.seal_hash(), target_bits, params.pow_time, cancel).run()?;
    envelope.nonce = nonce;

    tracing::debug!(
        topic = %envelope.topic,
        size = envelope.size(),
        bits,
        target_bits,
        "sealed envelope"
    );
    Ok(envelope)
}

fn encode_frame(params: &SealParams) -> Result<Vec<u8>> {
    let signature = params.signer.as_ref().map(|signer| FrameSignature {
        public_key: *signer.signing_public_key().as_bytes(),
        signature: Bytes::copy_from_slice(&signer.sign(&params.payload)),
    });

    let mut frame = Frame {
        payload: Bytes::copy_from_slice(&params.payload),
        padding: Bytes::new(),
        signature,
    };

    if let Some(padding) = &params.padding {
        frame.padding = Bytes::copy_from_slice(padding);
        return cbor(&frame);
    }

    // The padding length prefix grows at CBOR size thresholds, so alignment
    // can take a couple of rounds.
    let mut pad_len = 0usize;
    let mut encoded = cbor(&frame)?;
    for _ in 0..8 {
        let rem = encoded.len() % PADDING_BLOCK;
        if rem == 0 {
            break;
        }
        pad_len += PADDING_BLOCK - rem;
        let mut padding = vec![0u8; pad_len];
        rand::thread_rng().fill_bytes(&mut padding);
        frame.padding = Bytes::from(padding);
        encoded = cbor(&frame)?;
    }
    Ok(encoded)
}

fn cbor<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| CoreError::EncodingError(e.to_string()))?;
    Ok(buf)
}

/// Attempt to open an envelope with the given key.
pub fn try_decrypt(envelope: &Envelope, key: &DecryptionKey) -> DecryptOutcome {
    let (plaintext, recipient) = match key {
        DecryptionKey::Symmetric(k) => (k.decrypt(&envelope.data), None),
        DecryptionKey::Private(kp) => (kp.decrypt(&envelope.data), Some(kp.public_key())),
    };
    let Some(plaintext) = plaintext else {
        return DecryptOutcome::NoMatch;
    };

    let frame: Frame = match ciborium::from_reader(plaintext.as_slice()) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::debug!(error = %e, "decrypted envelope has malformed frame");
            return DecryptOutcome::NoMatch;
        }
    };

    let signer = match frame.signature {
        Some(sig) => {
            let public = Ed25519PublicKey(sig.public_key);
            let Ok(signature) = <[u8; 64]>::try_from(sig.signature.as_ref()) else {
                return DecryptOutcome::NoMatch;
            };
            if public.verify(&frame.payload, &signature).is_err() {
                tracing::debug!(signer = ?public, "dropping message with bad signature");
                return DecryptOutcome::NoMatch;
            }
            Some(public)
        }
        None => None,
    };

    DecryptOutcome::Opened(OpenedMessage {
        payload: frame.payload,
        padding: frame.padding,
        signer,
        recipient,
        topic: envelope.topic,
        timestamp: envelope.timestamp,
        ttl: envelope.ttl,
        pow: envelope.pow(),
        envelope_id: envelope.id(),
    })
}
