//! End-to-end tests of the `shh` API over an in-memory mesh.

use std::sync::Arc;
use std::time::Duration;

use hush::relay::{MemoryNetwork, MemoryTransport, PeerId, PeerRole};
use hush::store::MemoryStore;
use hush::{MessageView, NewFilterArgs, Node, NodeConfig, PostArgs, ShhApi, CODE_INVALID_PARAMS, CODE_OPERATIONAL};
use serde_json::json;

type Api = ShhApi<MemoryStore, MemoryTransport>;

const TOPIC: &str = "0xdeadbeef";

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Start one node per role. Nodes are linked only when `connect` is set.
async fn mesh(network: &Arc<MemoryNetwork>, roles: &[PeerRole], connect: bool) -> Vec<Api> {
    let mut apis = Vec::new();
    for role in roles {
        let transport = network.create_transport(PeerId::random(), *role).await;
        let mut config = NodeConfig::default();
        config.relay.role = *role;
        let node = Arc::new(Node::in_memory(config, transport).unwrap());
        node.start();
        apis.push(ShhApi::new(node));
    }
    if connect {
        network.connect_all().await;
    }
    apis
}

fn post_args(key: &str, payload: &str) -> PostArgs {
    PostArgs {
        sym_key_id: Some(key.to_string()),
        topic: Some(TOPIC.into()),
        payload: payload.into(),
        pow_target: 0.2,
        pow_time: 1,
        ..Default::default()
    }
}

fn sym_filter(key: &str) -> NewFilterArgs {
    NewFilterArgs {
        sym_key_id: Some(key.to_string()),
        topics: vec![TOPIC.into()],
        ..Default::default()
    }
}

/// Poll until `expected` messages arrived or the timeout passes.
async fn wait_for_messages(api: &Api, filter: &str, expected: usize) -> Vec<MessageView> {
    let mut messages = Vec::new();
    for _ in 0..100 {
        messages.extend(api.get_filter_messages(filter).unwrap());
        if messages.len() >= expected {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    messages
}

#[tokio::test]
async fn test_key_lifecycle() {
    init_tracing();
    let network = MemoryNetwork::new();
    let api = mesh(&network, &[PeerRole::Full], false).await.remove(0);

    let sym = api.new_sym_key().unwrap();
    assert!(api.has_sym_key(&sym).unwrap());
    assert!(!api.has_key_pair(&sym).unwrap());
    assert!(api.delete_sym_key(&sym).unwrap());
    assert!(!api.delete_sym_key(&sym).unwrap());

    let pair = api.new_key_pair().unwrap();
    let public = api.get_public_key(&pair).unwrap();
    assert!(public.starts_with("0x"));
    assert_eq!(public.len(), 2 + 64);
    assert!(!api.delete_sym_key(&pair).unwrap());
    assert!(api.has_key_pair(&pair).unwrap());

    // A symmetric id has no public key.
    let sym = api.new_sym_key().unwrap();
    assert_eq!(api.get_public_key(&sym).unwrap_err().code, CODE_OPERATIONAL);

    // Imported secrets give stable public keys.
    let secret = format!("0x{}", "11".repeat(32));
    let a = api.add_private_key(&secret).unwrap();
    let b = api.add_private_key(&secret).unwrap();
    assert_ne!(a, b);
    assert_eq!(api.get_public_key(&a).unwrap(), api.get_public_key(&b).unwrap());

    assert_eq!(api.has_sym_key("not hex").unwrap_err().code, CODE_INVALID_PARAMS);
}

#[tokio::test]
async fn test_post_without_peers() {
    init_tracing();
    let network = MemoryNetwork::new();
    let api = mesh(&network, &[PeerRole::Full], false).await.remove(0);

    let key = api.generate_sym_key_from_password("some password").unwrap();
    let err = api.post(post_args(&key, "0x68656c6c6f")).await.unwrap_err();
    assert_eq!(err.to_string(), "-32000 no peers connected");
    assert_eq!(api.info().await.unwrap().messages, 0);
}

#[tokio::test]
async fn test_light_node_needs_full_peer() {
    init_tracing();
    let network = MemoryNetwork::new();
    let apis = mesh(&network, &[PeerRole::Light, PeerRole::Light], true).await;

    let key = apis[0].generate_sym_key_from_password("some password").unwrap();
    let err = apis[0].post(post_args(&key, "0x01")).await.unwrap_err();
    assert_eq!(err.code, CODE_OPERATIONAL);
    assert_eq!(err.message, "no full peers connected while node is light");
    assert_eq!(apis[0].info().await.unwrap().messages, 0);
}

#[tokio::test]
async fn test_light_node_posts_through_full_peer() {
    init_tracing();
    let network = MemoryNetwork::new();
    let apis = mesh(&network, &[PeerRole::Light, PeerRole::Full], true).await;
    let (light, full) = (&apis[0], &apis[1]);

    let receiver_key = full.generate_sym_key_from_password("some password").unwrap();
    let filter = full.new_message_filter(sym_filter(&receiver_key)).unwrap();

    let sender_key = light.generate_sym_key_from_password("some password").unwrap();
    let hash = light.post(post_args(&sender_key, "0x68656c6c6f")).await.unwrap();

    let messages = wait_for_messages(full, &filter, 1).await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].payload, "0x68656c6c6f");
    assert_eq!(messages[0].topic, TOPIC);
    assert_eq!(messages[0].hash, hash);
    assert!(messages[0].pow >= 0.2);

    // Exactly once: no echo back from the relay.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(full.get_filter_messages(&filter).unwrap().is_empty());
}

#[tokio::test]
async fn test_filter_poll_drains_queue() {
    init_tracing();
    let network = MemoryNetwork::new();
    let apis = mesh(&network, &[PeerRole::Full, PeerRole::Full], true).await;
    let (sender, receiver) = (&apis[0], &apis[1]);

    let key = receiver.generate_sym_key_from_password("drain").unwrap();
    let filter = receiver.new_message_filter(sym_filter(&key)).unwrap();
    let send_key = sender.generate_sym_key_from_password("drain").unwrap();

    sender.post(post_args(&send_key, "0x01")).await.unwrap();
    sender.post(post_args(&send_key, "0x02")).await.unwrap();
    let first = wait_for_messages(receiver, &filter, 2).await;
    assert_eq!(first.len(), 2);

    // Nothing new arrived, so the second poll is empty.
    assert!(receiver.get_filter_messages(&filter).unwrap().is_empty());

    sender.post(post_args(&send_key, "0x03")).await.unwrap();
    let second = wait_for_messages(receiver, &filter, 1).await;
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].payload, "0x03");
    assert!(receiver.get_filter_messages(&filter).unwrap().is_empty());
}

#[tokio::test]
async fn test_wrong_key_receives_nothing() {
    init_tracing();
    let network = MemoryNetwork::new();
    let apis = mesh(&network, &[PeerRole::Full, PeerRole::Full], true).await;

    let other = apis[1].new_sym_key().unwrap();
    let filter = apis[1].new_message_filter(sym_filter(&other)).unwrap();

    let key = apis[0].new_sym_key().unwrap();
    apis[0].post(post_args(&key, "0x01")).await.unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(apis[1].get_filter_messages(&filter).unwrap().is_empty());
    // Relayed and pooled anyway.
    assert_eq!(apis[1].info().await.unwrap().messages, 1);
}

#[tokio::test]
async fn test_asymmetric_and_signed() {
    init_tracing();
    let network = MemoryNetwork::new();
    let apis = mesh(&network, &[PeerRole::Full, PeerRole::Full], true).await;
    let (sender, receiver) = (&apis[0], &apis[1]);

    let pair = receiver.new_key_pair().unwrap();
    let public = receiver.get_public_key(&pair).unwrap();
    let filter = receiver
        .new_message_filter(NewFilterArgs {
            private_key_id: Some(pair),
            topics: vec![TOPIC.into()],
            ..Default::default()
        })
        .unwrap();

    let signer = sender.new_key_pair().unwrap();
    sender
        .post(PostArgs {
            pub_key: Some(public.clone()),
            sig: Some(signer),
            topic: Some(TOPIC.into()),
            payload: "0xc0ffee".into(),
            pow_target: 0.2,
            pow_time: 1,
            ..Default::default()
        })
        .await
        .unwrap();

    let messages = wait_for_messages(receiver, &filter, 1).await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].payload, "0xc0ffee");
    assert_eq!(messages[0].recipient_public_key.as_deref(), Some(public.as_str()));
    assert!(messages[0].sig.is_some());
}

#[tokio::test]
async fn test_direct_message_to_trusted_peer() {
    init_tracing();
    let network = MemoryNetwork::new();
    let apis = mesh(&network, &[PeerRole::Full, PeerRole::Full], true).await;
    let (sender, receiver) = (&apis[0], &apis[1]);

    let key = receiver.generate_sym_key_from_password("p2p").unwrap();
    let relayed_only = receiver.new_message_filter(sym_filter(&key)).unwrap();
    let p2p = receiver
        .new_message_filter(NewFilterArgs {
            allow_p2p: true,
            ..sym_filter(&key)
        })
        .unwrap();
    receiver
        .mark_trusted_peer(&sender.node().peer_id().to_hex())
        .unwrap();

    let sender_key = sender.generate_sym_key_from_password("p2p").unwrap();
    sender
        .post(PostArgs {
            target_peer: Some(receiver.node().peer_id().to_hex()),
            ..post_args(&sender_key, "0x0102")
        })
        .await
        .unwrap();

    let messages = wait_for_messages(receiver, &p2p, 1).await;
    assert_eq!(messages.len(), 1);
    assert!(messages[0].direct);
    assert!(receiver.get_filter_messages(&relayed_only).unwrap().is_empty());
    // Direct envelopes are not pooled.
    assert_eq!(receiver.info().await.unwrap().messages, 0);
}

#[tokio::test]
async fn test_filter_validation() {
    init_tracing();
    let network = MemoryNetwork::new();
    let api = mesh(&network, &[PeerRole::Full], false).await.remove(0);
    let key = api.new_sym_key().unwrap();

    let no_topics = NewFilterArgs {
        sym_key_id: Some(key.clone()),
        ..Default::default()
    };
    assert_eq!(api.new_message_filter(no_topics).unwrap_err().code, CODE_OPERATIONAL);

    let both_keys = NewFilterArgs {
        private_key_id: Some(key.clone()),
        ..sym_filter(&key)
    };
    assert_eq!(api.new_message_filter(both_keys).unwrap_err().code, CODE_INVALID_PARAMS);

    let filter = api.new_message_filter(sym_filter(&key)).unwrap();
    assert!(api.delete_message_filter(&filter).unwrap());
    assert!(!api.delete_message_filter(&filter).unwrap());
    assert_eq!(api.get_filter_messages(&filter).unwrap_err().code, CODE_OPERATIONAL);
}

#[tokio::test]
async fn test_json_dispatch() {
    init_tracing();
    let network = MemoryNetwork::new();
    let api = mesh(&network, &[PeerRole::Full], false).await.remove(0);

    let key = api.handle("shh_newSymKey", json!([])).await.unwrap();
    let key = key.as_str().unwrap().to_string();
    assert_eq!(api.handle("shh_hasSymKey", json!([key])).await.unwrap(), json!(true));

    let filter = api
        .handle(
            "shh_newMessageFilter",
            json!([{ "symKeyID": key, "topics": [TOPIC] }]),
        )
        .await
        .unwrap();
    assert!(filter.is_string());

    let err = api
        .handle(
            "shh_post",
            json!([{ "symKeyID": key, "topic": TOPIC, "payload": "0x01", "powTarget": 0.2, "powTime": 1 }]),
        )
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "-32000 no peers connected");

    assert_eq!(api.handle("shh_setMinPoW", json!([0.5])).await.unwrap(), json!(true));
    let info = api.handle("shh_info", json!([])).await.unwrap();
    assert_eq!(info["minPow"], json!(0.5));
    assert_eq!(info["maxMessageSize"], json!(1024 * 1024));

    assert_eq!(api.handle("shh_nope", json!([])).await.unwrap_err().code, -32601);
    assert_eq!(
        api.handle("shh_hasSymKey", json!([])).await.unwrap_err().code,
        CODE_INVALID_PARAMS
    );
}

#[tokio::test]
async fn test_stop_is_clean() {
    init_tracing();
    let network = MemoryNetwork::new();
    let api = mesh(&network, &[PeerRole::Full], false).await.remove(0);
    api.node().stop().await;
    api.node().stop().await;
}
