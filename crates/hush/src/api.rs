//! Boundary API.
//!
//! Mirrors the `shh_*` JSON-RPC surface: typed methods on [`ShhApi`], plus
//! [`ShhApi::handle`] dispatching method names with JSON parameters. Binary
//! values travel as `0x`-prefixed hex, key and filter ids as bare hex.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use hush_core::{KeyPair, SymmetricKey, Topic, X25519PublicKey};
use hush_filter::{FilterId, FilterKey, FilterSpec, KeyId, MatchedMessage};
use hush_relay::{PeerId, PeerNetwork};
use hush_store::Store;

use crate::error::{NodeError, CODE_INVALID_PARAMS};
use crate::node::{Node, NodeInfo, PostRequest, Recipient};

/// Error returned across the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: i32,
    pub message: String,
}

impl ApiError {
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: CODE_INVALID_PARAMS,
            message: message.into(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<NodeError> for ApiError {
    fn from(err: NodeError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

/// Result type for boundary calls.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Parameters of `shh_newMessageFilter`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NewFilterArgs {
    #[serde(rename = "symKeyID", skip_serializing_if = "Option::is_none")]
    pub sym_key_id: Option<String>,
    #[serde(rename = "privateKeyID", skip_serializing_if = "Option::is_none")]
    pub private_key_id: Option<String>,
    pub topics: Vec<String>,
    #[serde(rename = "allowP2P")]
    pub allow_p2p: bool,
    pub min_pow: f64,
}

/// Parameters of `shh_post`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PostArgs {
    #[serde(rename = "symKeyID", skip_serializing_if = "Option::is_none")]
    pub sym_key_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pub_key: Option<String>,
    /// Id of the key pair to sign with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sig: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    pub payload: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub padding: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
    pub pow_target: f64,
    /// Seconds.
    pub pow_time: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_peer: Option<String>,
}

/// A received message as returned by `shh_getFilterMessages`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sig: Option<String>,
    pub ttl: u32,
    pub timestamp: u64,
    pub topic: String,
    pub payload: String,
    pub padding: String,
    pub pow: f64,
    pub hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_public_key: Option<String>,
    #[serde(rename = "p2p")]
    pub direct: bool,
}

impl From<MatchedMessage> for MessageView {
    fn from(message: MatchedMessage) -> Self {
        let opened = message.opened;
        Self {
            sig: opened.signer.map(|key| encode_hex(key.as_bytes())),
            ttl: opened.ttl,
            timestamp: opened.timestamp,
            topic: opened.topic.to_hex(),
            payload: encode_hex(&opened.payload),
            padding: encode_hex(&opened.padding),
            pow: opened.pow,
            hash: encode_hex(opened.envelope_id.as_bytes()),
            recipient_public_key: opened.recipient.map(|key| encode_hex(key.as_bytes())),
            direct: message.direct,
        }
    }
}

/// `0x`-prefixed lowercase hex.
pub fn encode_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Decode hex with or without a `0x` prefix.
pub fn decode_hex(s: &str) -> ApiResult<Vec<u8>> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(digits).map_err(|e| ApiError::invalid_params(format!("invalid hex {s:?}: {e}")))
}

fn parse_key_id(s: &str) -> ApiResult<KeyId> {
    KeyId::from_hex(s).map_err(|_| ApiError::invalid_params(format!("invalid key id: {s}")))
}

fn parse_filter_id(s: &str) -> ApiResult<FilterId> {
    FilterId::from_hex(s).map_err(|_| ApiError::invalid_params(format!("invalid filter id: {s}")))
}

fn parse_topic(s: &str) -> ApiResult<Topic> {
    Topic::from_hex(s).map_err(|e| ApiError::invalid_params(e.to_string()))
}

/// The `shh` API of one node.
pub struct ShhApi<S: Store, N: PeerNetwork> {
    node: Arc<Node<S, N>>,
}

impl<S: Store, N: PeerNetwork> Clone for ShhApi<S, N> {
    fn clone(&self) -> Self {
        Self {
            node: Arc::clone(&self.node),
        }
    }
}

impl<S: Store + 'static, N: PeerNetwork + 'static> ShhApi<S, N> {
    pub fn new(node: Arc<Node<S, N>>) -> Self {
        Self { node }
    }

    pub fn node(&self) -> &Arc<Node<S, N>> {
        &self.node
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Symmetric keys
    // ─────────────────────────────────────────────────────────────────────────

    pub fn new_sym_key(&self) -> ApiResult<String> {
        Ok(self.node.keys().generate_symmetric_key().to_hex())
    }

    pub fn generate_sym_key_from_password(&self, password: &str) -> ApiResult<String> {
        let id = self
            .node
            .keys()
            .add_symmetric_key_from_passphrase(password)
            .map_err(NodeError::from)?;
        Ok(id.to_hex())
    }

    pub fn add_sym_key(&self, key: &str) -> ApiResult<String> {
        let key = SymmetricKey::from_slice(&decode_hex(key)?).map_err(NodeError::from)?;
        Ok(self.node.keys().add_symmetric_key(key).to_hex())
    }

    pub fn has_sym_key(&self, id: &str) -> ApiResult<bool> {
        Ok(self.node.keys().has_symmetric_key(&parse_key_id(id)?))
    }

    /// Returns whether a symmetric key was removed.
    pub fn delete_sym_key(&self, id: &str) -> ApiResult<bool> {
        let id = parse_key_id(id)?;
        Ok(self.node.keys().has_symmetric_key(&id) && self.node.keys().remove_key(&id))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Key pairs
    // ─────────────────────────────────────────────────────────────────────────

    pub fn new_key_pair(&self) -> ApiResult<String> {
        Ok(self.node.keys().generate_key_pair().to_hex())
    }

    pub fn add_private_key(&self, key: &str) -> ApiResult<String> {
        let pair = KeyPair::from_slice(&decode_hex(key)?).map_err(NodeError::from)?;
        Ok(self.node.keys().add_key_pair(pair).to_hex())
    }

    pub fn get_public_key(&self, id: &str) -> ApiResult<String> {
        let public = self
            .node
            .keys()
            .public_key(&parse_key_id(id)?)
            .map_err(NodeError::from)?;
        Ok(encode_hex(public.as_bytes()))
    }

    pub fn has_key_pair(&self, id: &str) -> ApiResult<bool> {
        Ok(self.node.keys().has_key_pair(&parse_key_id(id)?))
    }

    /// Returns whether a key pair was removed.
    pub fn delete_key_pair(&self, id: &str) -> ApiResult<bool> {
        let id = parse_key_id(id)?;
        Ok(self.node.keys().has_key_pair(&id) && self.node.keys().remove_key(&id))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Filters
    // ─────────────────────────────────────────────────────────────────────────

    pub fn new_message_filter(&self, args: NewFilterArgs) -> ApiResult<String> {
        let key = match (&args.sym_key_id, &args.private_key_id) {
            (Some(id), None) => FilterKey::Symmetric(parse_key_id(id)?),
            (None, Some(id)) => FilterKey::Private(parse_key_id(id)?),
            _ => {
                return Err(ApiError::invalid_params(
                    "exactly one of symKeyID or privateKeyID is required",
                ))
            }
        };
        let topics = args
            .topics
            .iter()
            .map(|t| parse_topic(t))
            .collect::<ApiResult<Vec<_>>>()?;

        let spec = FilterSpec::new(key, topics)
            .allow_p2p(args.allow_p2p)
            .min_pow(args.min_pow);
        let id = self.node.filters().register(spec).map_err(NodeError::from)?;
        Ok(id.to_hex())
    }

    /// Returns whether a filter was removed.
    pub fn delete_message_filter(&self, id: &str) -> ApiResult<bool> {
        Ok(self.node.filters().unregister(&parse_filter_id(id)?))
    }

    /// Drain the filter's queue.
    pub fn get_filter_messages(&self, id: &str) -> ApiResult<Vec<MessageView>> {
        let messages = self
            .node
            .filters()
            .poll(&parse_filter_id(id)?)
            .map_err(NodeError::from)?;
        Ok(messages.map(MessageView::from).collect())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Messaging and node control
    // ─────────────────────────────────────────────────────────────────────────

    /// Seal and send a message. Returns the envelope hash.
    pub async fn post(&self, args: PostArgs) -> ApiResult<String> {
        let recipient = match (&args.sym_key_id, &args.pub_key) {
            (Some(id), None) => Recipient::SymmetricKey(parse_key_id(id)?),
            (None, Some(key)) => Recipient::PublicKey(
                X25519PublicKey::from_slice(&decode_hex(key)?).map_err(NodeError::from)?,
            ),
            _ => return Err(ApiError::invalid_params("exactly one of symKeyID or pubKey is required")),
        };
        let topic = match (&args.topic, &recipient) {
            (Some(topic), _) => parse_topic(topic)?,
            (None, Recipient::PublicKey(_)) => Topic::from_bytes([0; Topic::LEN]),
            (None, Recipient::SymmetricKey(_)) => {
                return Err(ApiError::invalid_params("topic is required for symmetric messages"))
            }
        };

        let mut request = PostRequest::new(recipient, topic, decode_hex(&args.payload)?)
            .pow(args.pow_target, Duration::from_secs(u64::from(args.pow_time)));
        if let Some(sig) = &args.sig {
            request = request.signer(parse_key_id(sig)?);
        }
        if let Some(padding) = &args.padding {
            request.padding = Some(decode_hex(padding)?);
        }
        if let Some(ttl) = args.ttl {
            request = request.ttl(ttl);
        }
        if let Some(peer) = &args.target_peer {
            let peer = PeerId::from_hex(peer)
                .map_err(|_| ApiError::invalid_params(format!("invalid peer id: {peer}")))?;
            request = request.direct(peer);
        }

        let id = self.node.post(request).await?;
        Ok(encode_hex(id.as_bytes()))
    }

    pub fn mark_trusted_peer(&self, peer: &str) -> ApiResult<bool> {
        let peer = PeerId::from_hex(peer)
            .map_err(|_| ApiError::invalid_params(format!("invalid peer id: {peer}")))?;
        self.node.mark_trusted_peer(peer);
        Ok(true)
    }

    pub async fn set_min_pow(&self, pow: f64) -> ApiResult<bool> {
        self.node.set_min_pow(pow).await?;
        Ok(true)
    }

    pub async fn info(&self) -> ApiResult<NodeInfo> {
        Ok(self.node.info().await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // JSON dispatch
    // ─────────────────────────────────────────────────────────────────────────

    /// Call a method by its `shh_*` name with positional JSON parameters.
    pub async fn handle(&self, method: &str, params: Value) -> ApiResult<Value> {
        let params = Params::new(params)?;
        match method {
            "shh_newSymKey" => to_value(self.new_sym_key()),
            "shh_generateSymKeyFromPassword" => {
                to_value(self.generate_sym_key_from_password(&params.arg::<String>(0)?))
            }
            "shh_addSymKey" => to_value(self.add_sym_key(&params.arg::<String>(0)?)),
            "shh_hasSymKey" => to_value(self.has_sym_key(&params.arg::<String>(0)?)),
            "shh_deleteSymKey" => to_value(self.delete_sym_key(&params.arg::<String>(0)?)),
            "shh_newKeyPair" => to_value(self.new_key_pair()),
            "shh_addPrivateKey" => to_value(self.add_private_key(&params.arg::<String>(0)?)),
            "shh_getPublicKey" => to_value(self.get_public_key(&params.arg::<String>(0)?)),
            "shh_hasKeyPair" => to_value(self.has_key_pair(&params.arg::<String>(0)?)),
            "shh_deleteKeyPair" => to_value(self.delete_key_pair(&params.arg::<String>(0)?)),
            "shh_newMessageFilter" => to_value(self.new_message_filter(params.arg(0)?)),
            "shh_deleteMessageFilter" => {
                to_value(self.delete_message_filter(&params.arg::<String>(0)?))
            }
            "shh_getFilterMessages" => {
                to_value(self.get_filter_messages(&params.arg::<String>(0)?))
            }
            "shh_post" => to_value(self.post(params.arg(0)?).await),
            "shh_markTrustedPeer" => to_value(self.mark_trusted_peer(&params.arg::<String>(0)?)),
            "shh_setMinPoW" => to_value(self.set_min_pow(params.arg(0)?).await),
            "shh_info" => to_value(self.info().await),
            _ => Err(ApiError {
                code: -32601,
                message: format!("the method {method} does not exist/is not available"),
            }),
        }
    }
}

struct Params(Vec<Value>);

impl Params {
    fn new(value: Value) -> ApiResult<Self> {
        match value {
            Value::Array(values) => Ok(Self(values)),
            Value::Null => Ok(Self(Vec::new())),
            other => Ok(Self(vec![other])),
        }
    }

    fn arg<T: serde::de::DeserializeOwned>(&self, index: usize) -> ApiResult<T> {
        let value = self
            .0
            .get(index)
            .cloned()
            .ok_or_else(|| ApiError::invalid_params(format!("missing value for required argument {index}")))?;
        serde_json::from_value(value)
            .map_err(|e| ApiError::invalid_params(format!("invalid argument {index}: {e}")))
    }
}

fn to_value<T: Serialize>(result: ApiResult<T>) -> ApiResult<Value> {
    let value = result?;
    serde_json::to_value(value).map_err(|e| ApiError {
        code: crate::error::CODE_OPERATIONAL,
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_helpers() {
        assert_eq!(encode_hex(&[0xab, 0x01]), "0xab01");
        assert_eq!(decode_hex("0xab01").unwrap(), vec![0xab, 0x01]);
        assert_eq!(decode_hex("ab01").unwrap(), vec![0xab, 0x01]);
        assert_eq!(decode_hex("0xzz").unwrap_err().code, CODE_INVALID_PARAMS);
    }

    #[test]
    fn test_api_error_display() {
        let err = ApiError::from(NodeError::from(hush_relay::RelayError::NoPeers));
        assert_eq!(err.to_string(), "-32000 no peers connected");
    }

    #[test]
    fn test_filter_args_field_names() {
        let args: NewFilterArgs = serde_json::from_str(
            r#"{"symKeyID": "00", "topics": ["0x01020304"], "allowP2P": true, "minPow": 0.5}"#,
        )
        .unwrap();
        assert_eq!(args.sym_key_id.as_deref(), Some("00"));
        assert!(args.allow_p2p);
        assert_eq!(args.min_pow, 0.5);
    }

    #[test]
    fn test_post_args_field_names() {
        let args: PostArgs = serde_json::from_str(
            r#"{"symKeyID": "00", "topic": "0x01020304", "payload": "0x6869", "powTarget": 0.2, "powTime": 1}"#,
        )
        .unwrap();
        assert_eq!(args.pow_time, 1);
        assert_eq!(args.pow_target, 0.2);
        assert!(args.ttl.is_none());
    }
}
