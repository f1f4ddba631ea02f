//! Canonical CBOR encoding for envelopes.
//!
//! Envelopes are encoded as a CBOR map with small integer keys:
//! - Map keys in ascending order (0-4 encode as single bytes)
//! - Integers use smallest valid encoding
//! - Definite lengths only
//!
//! The same envelope always produces identical bytes, so its Blake3 hash can
//! be used as identity and as the proof-of-work preimage.

use bytes::Bytes;
use ciborium::value::Value;

use crate::envelope::Envelope;
use crate::error::CoreError;
use crate::topic::Topic;

/// Envelope field keys.
mod keys {
    pub const TIMESTAMP: u64 = 0;
    pub const TTL: u64 = 1;
    pub const TOPIC: u64 = 2;
    pub const DATA: u64 = 3;
    pub const NONCE: u64 = 4;
}

/// Encode the fields covered by proof-of-work (everything but the nonce).
pub fn seal_header_bytes(envelope: &Envelope) -> Vec<u8> {
    let mut buf = Vec::with_capacity(envelope.data.len() + 32);
    encode_uint(&mut buf, 5, 4);
    encode_fields(&mut buf, envelope);
    buf
}

/// Encode an entire envelope to canonical bytes.
pub fn envelope_bytes(envelope: &Envelope) -> Vec<u8> {
    let mut buf = Vec::with_capacity(envelope.data.len() + 48);
    encode_uint(&mut buf, 5, 5);
    encode_fields(&mut buf, envelope);
    encode_uint(&mut buf, 0, keys::NONCE);
    encode_uint(&mut buf, 0, envelope.nonce);
    buf
}

fn encode_fields(buf: &mut Vec<u8>, envelope: &Envelope) {
    encode_uint(buf, 0, keys::TIMESTAMP);
    encode_uint(buf, 0, envelope.timestamp);

    encode_uint(buf, 0, keys::TTL);
    encode_uint(buf, 0, envelope.ttl.into());

    encode_uint(buf, 0, keys::TOPIC);
    encode_bytes(buf, envelope.topic.as_bytes());

    encode_uint(buf, 0, keys::DATA);
    encode_bytes(buf, &envelope.data);
}

/// Encode an unsigned integer with the given major type.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

/// Encode a byte string (major type 2).
fn encode_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    encode_uint(buf, 2, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

/// Decode an envelope from canonical bytes.
pub fn decode_envelope(bytes: &[u8]) -> Result<Envelope, CoreError> {
    let value: Value =
        ciborium::from_reader(bytes).map_err(|e| CoreError::DecodingError(e.to_string()))?;

    let entries = match value {
        Value::Map(entries) => entries,
        _ => return Err(CoreError::DecodingError("envelope is not a map".into())),
    };

    let mut timestamp = None;
    let mut ttl = None;
    let mut topic = None;
    let mut data = None;
    let mut nonce = None;

    for (key, value) in entries {
        let key = as_u64(&key)?;
        match key {
            keys::TIMESTAMP => timestamp = Some(as_u64(&value)?),
            keys::TTL => {
                let raw = as_u64(&value)?;
                ttl = Some(
                    u32::try_from(raw)
                        .map_err(|_| CoreError::DecodingError("ttl out of range".into()))?,
                );
            }
            keys::TOPIC => {
                let raw = as_bytes(value)?;
                let arr: [u8; 4] = raw
                    .as_slice()
                    .try_into()
                    .map_err(|_| CoreError::DecodingError("topic must be 4 bytes".into()))?;
                topic = Some(Topic::from_bytes(arr));
            }
            keys::DATA => data = Some(Bytes::from(as_bytes(value)?)),
            keys::NONCE => nonce = Some(as_u64(&value)?),
            other => {
                return Err(CoreError::DecodingError(format!("unknown field key {other}")));
            }
        }
    }

    let missing = |name: &str| CoreError::DecodingError(format!("missing field {name}"));
    Ok(Envelope {
        timestamp: timestamp.ok_or_else(|| missing("timestamp"))?,
        ttl: ttl.ok_or_else(|| missing("ttl"))?,
        topic: topic.ok_or_else(|| missing("topic"))?,
        data: data.ok_or_else(|| missing("data"))?,
        nonce: nonce.ok_or_else(|| missing("nonce"))?,
    })
}

fn as_u64(value: &Value) -> Result<u64, CoreError> {
    match value {
        Value::Integer(i) => u64::try_from(*i)
            .map_err(|_| CoreError::DecodingError("integer out of range".into())),
        _ => Err(CoreError::DecodingError("expected integer".into())),
    }
}

fn as_bytes(value: Value) -> Result<Vec<u8>, CoreError> {
    match value {
        Value::Bytes(b) => Ok(b),
        _ => Err(CoreError::DecodingError("expected byte string".into())),
    }
}
