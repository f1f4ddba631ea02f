//! Proptest generators for property-based testing.

use std::time::Duration;

use bytes::Bytes;
use proptest::prelude::*;
use tokio_util::sync::CancellationToken;

use hush_core::{seal, EncryptionTarget, Envelope, KeyPair, SealParams, SymmetricKey, Topic};

/// Generate a random topic.
pub fn topic() -> impl Strategy<Value = Topic> {
    any::<[u8; 4]>().prop_map(Topic::from_bytes)
}

/// Generate a random symmetric key.
pub fn symmetric_key() -> impl Strategy<Value = SymmetricKey> {
    any::<[u8; 32]>().prop_map(SymmetricKey::from_bytes)
}

/// Generate a random key pair.
pub fn key_pair() -> impl Strategy<Value = KeyPair> {
    any::<[u8; 32]>().prop_map(|seed| KeyPair::from_seed(&seed))
}

/// Generate payload bytes of specified max length.
pub fn payload(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Generate a TTL in seconds.
pub fn ttl() -> impl Strategy<Value = u32> {
    1u32..=3600
}

/// Generate an unsealed envelope with arbitrary (undecryptable) data.
pub fn raw_envelope() -> impl Strategy<Value = Envelope> {
    (any::<u64>(), ttl(), topic(), payload(512), any::<u64>()).prop_map(
        |(timestamp, ttl, topic, data, nonce)| Envelope {
            timestamp,
            ttl,
            topic,
            data: Bytes::from(data),
            nonce,
        },
    )
}

/// Inputs for sealing one envelope.
#[derive(Debug, Clone)]
pub struct SealInput {
    pub key: SymmetricKey,
    pub topic: Topic,
    pub payload: Vec<u8>,
    pub ttl: u32,
    pub signer: Option<KeyPair>,
}

impl Arbitrary for SealInput {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            symmetric_key(),
            topic(),
            payload(1024),
            ttl(),
            proptest::option::of(key_pair()),
        )
            .prop_map(|(key, topic, payload, ttl, signer)| SealInput {
                key,
                topic,
                payload,
                ttl,
                signer,
            })
            .boxed()
    }
}

/// Seal an input with a tiny PoW budget. Returns the envelope and its key.
pub fn sealed_from_input(input: &SealInput) -> (Envelope, SymmetricKey) {
    let mut params = SealParams::new(
        input.payload.clone(),
        input.topic,
        EncryptionTarget::Symmetric(input.key.clone()),
    )
    .ttl(input.ttl)
    .pow(0.01, Duration::from_millis(50));
    if let Some(signer) = &input.signer {
        params = params.signer(signer.clone());
    }
    match seal(params, &CancellationToken::new()) {
        Ok(envelope) => (envelope, input.key.clone()),
        Err(e) => panic!("sealing generated input: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hush_core::{try_decrypt, DecryptionKey};

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_sealed_input_opens_to_payload(input: SealInput) {
            let (envelope, key) = sealed_from_input(&input);
            let opened = try_decrypt(&envelope, &DecryptionKey::Symmetric(key)).opened();
            prop_assert!(opened.is_some());
            let opened = opened.unwrap();
            prop_assert_eq!(opened.payload.as_ref(), input.payload.as_slice());
            prop_assert_eq!(
                opened.signer,
                input.signer.as_ref().map(|s| s.signing_public_key())
            );
        }

        #[test]
        fn prop_raw_envelope_id_survives_wire(envelope in raw_envelope()) {
            let decoded = Envelope::from_bytes(&envelope.to_bytes()).unwrap();
            prop_assert_eq!(decoded.id(), envelope.id());
            prop_assert_eq!(decoded, envelope);
        }
    }
}
