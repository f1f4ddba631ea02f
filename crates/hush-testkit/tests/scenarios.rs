//! Multi-node relay scenarios over the in-memory mesh.

use std::time::Duration;

use hush::{NewFilterArgs, PostArgs};
use hush_relay::PeerRole;
use hush_testkit::{wait_for_messages, TestApi, TestMesh};

const TOPIC: &str = "0x5a5a5a5a";
const WAIT: Duration = Duration::from_secs(2);

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn post(key: &str, payload: &str) -> PostArgs {
    PostArgs {
        sym_key_id: Some(key.to_string()),
        topic: Some(TOPIC.into()),
        payload: payload.into(),
        pow_target: 0.2,
        pow_time: 1,
        ..Default::default()
    }
}

fn subscribe(api: &TestApi, key: &str) -> String {
    api.new_message_filter(NewFilterArgs {
        sym_key_id: Some(key.to_string()),
        topics: vec![TOPIC.into()],
        ..Default::default()
    })
    .unwrap()
}

#[tokio::test]
async fn no_peers_stores_nothing() {
    init_tracing();
    let mesh = TestMesh::new(&[PeerRole::Full]).await;
    let api = mesh.api(0);

    let key = api.generate_sym_key_from_password("some password").unwrap();
    let filter = subscribe(api, &key);
    let err = api.post(post(&key, "0x01")).await.unwrap_err();

    assert_eq!(err.message, "no peers connected");
    assert_eq!(api.info().await.unwrap().messages, 0);
    // Rejected before sealing, so not even the local filter sees it.
    assert!(api.get_filter_messages(&filter).unwrap().is_empty());
}

#[tokio::test]
async fn light_with_only_light_peers_is_rejected() {
    init_tracing();
    let mesh = TestMesh::new(&[PeerRole::Light, PeerRole::Light, PeerRole::Light]).await;
    mesh.connect_all().await;

    let key = mesh.api(0).new_sym_key().unwrap();
    let err = mesh.api(0).post(post(&key, "0x01")).await.unwrap_err();
    assert_eq!(err.code, -32000);
    assert_eq!(err.message, "no full peers connected while node is light");
}

#[tokio::test]
async fn light_sender_full_receiver_gets_exactly_one() {
    init_tracing();
    let mesh = TestMesh::new(&[PeerRole::Light, PeerRole::Full]).await;
    mesh.connect(0, 1).await;

    let recv_key = mesh.api(1).generate_sym_key_from_password("some password").unwrap();
    let filter = subscribe(mesh.api(1), &recv_key);

    let send_key = mesh.api(0).generate_sym_key_from_password("some password").unwrap();
    mesh.api(0).post(post(&send_key, "0x74657374")).await.unwrap();

    let messages = wait_for_messages(mesh.api(1), &filter, 1, WAIT).await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].payload, "0x74657374");

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(mesh.api(1).get_filter_messages(&filter).unwrap().is_empty());
    mesh.shutdown().await;
}

#[tokio::test]
async fn relays_across_hops() {
    init_tracing();
    // 0 - 1 - 2 in a line: 2 only hears 0 through 1.
    let mesh = TestMesh::new(&[PeerRole::Full, PeerRole::Light, PeerRole::Full]).await;
    mesh.connect(0, 1).await;
    mesh.connect(1, 2).await;

    let key = mesh.api(2).generate_sym_key_from_password("far away").unwrap();
    let filter = subscribe(mesh.api(2), &key);

    let send_key = mesh.api(0).generate_sym_key_from_password("far away").unwrap();
    mesh.api(0).post(post(&send_key, "0x6869")).await.unwrap();

    let messages = wait_for_messages(mesh.api(2), &filter, 1, WAIT).await;
    assert_eq!(messages.len(), 1);

    // Everyone pooled it exactly once.
    for i in 0..3 {
        assert_eq!(mesh.api(i).info().await.unwrap().messages, 1);
    }
    let relay_stats = mesh.nodes[1].node.stats();
    assert_eq!(relay_stats.accepted, 1);
    mesh.shutdown().await;
}

#[tokio::test]
async fn wrong_key_gets_nothing() {
    init_tracing();
    let mesh = TestMesh::new(&[PeerRole::Full, PeerRole::Full]).await;
    mesh.connect_all().await;

    let key = mesh.api(1).generate_sym_key_from_password("right").unwrap();
    let filter = subscribe(mesh.api(1), &key);

    let wrong = mesh.api(0).generate_sym_key_from_password("wrong").unwrap();
    mesh.api(0).post(post(&wrong, "0x01")).await.unwrap();

    let messages = wait_for_messages(mesh.api(1), &filter, 1, Duration::from_millis(300)).await;
    assert!(messages.is_empty());
    mesh.shutdown().await;
}

#[tokio::test]
async fn disjoint_filters_on_one_topic() {
    init_tracing();
    let mesh = TestMesh::new(&[PeerRole::Full, PeerRole::Full]).await;
    mesh.connect_all().await;
    let receiver = mesh.api(1);

    let key_a = receiver.generate_sym_key_from_password("alpha").unwrap();
    let key_b = receiver.generate_sym_key_from_password("beta").unwrap();
    let filter_a = subscribe(receiver, &key_a);
    let filter_b = subscribe(receiver, &key_b);

    let sender_a = mesh.api(0).generate_sym_key_from_password("alpha").unwrap();
    let sender_b = mesh.api(0).generate_sym_key_from_password("beta").unwrap();
    mesh.api(0).post(post(&sender_a, "0xaa")).await.unwrap();
    mesh.api(0).post(post(&sender_b, "0xbb")).await.unwrap();

    let got_a = wait_for_messages(receiver, &filter_a, 1, WAIT).await;
    let got_b = wait_for_messages(receiver, &filter_b, 1, WAIT).await;
    assert_eq!(got_a.len(), 1);
    assert_eq!(got_b.len(), 1);
    assert_eq!(got_a[0].payload, "0xaa");
    assert_eq!(got_b[0].payload, "0xbb");
    mesh.shutdown().await;
}

#[tokio::test]
async fn direct_messages_need_trust() {
    init_tracing();
    let mesh = TestMesh::new(&[PeerRole::Full, PeerRole::Full]).await;
    mesh.connect_all().await;
    let (sender, receiver) = (mesh.api(0), mesh.api(1));

    let key = receiver.generate_sym_key_from_password("p2p").unwrap();
    let filter = receiver
        .new_message_filter(NewFilterArgs {
            sym_key_id: Some(key),
            topics: vec![TOPIC.into()],
            allow_p2p: true,
            ..Default::default()
        })
        .unwrap();

    let send_key = sender.generate_sym_key_from_password("p2p").unwrap();
    let direct = PostArgs {
        target_peer: Some(mesh.nodes[1].peer_id().to_hex()),
        ..post(&send_key, "0x01")
    };

    // Not trusted yet: dropped.
    sender.post(direct.clone()).await.unwrap();
    let messages = wait_for_messages(receiver, &filter, 1, Duration::from_millis(300)).await;
    assert!(messages.is_empty());

    receiver
        .mark_trusted_peer(&mesh.nodes[0].peer_id().to_hex())
        .unwrap();
    sender.post(direct).await.unwrap();
    let messages = wait_for_messages(receiver, &filter, 1, WAIT).await;
    assert_eq!(messages.len(), 1);
    assert!(messages[0].direct);
    mesh.shutdown().await;
}

#[tokio::test]
async fn high_pow_requirement_blocks_relay() {
    init_tracing();
    let mesh = TestMesh::new(&[PeerRole::Full, PeerRole::Full]).await;
    mesh.connect_all().await;

    let key = mesh.api(1).generate_sym_key_from_password("pow").unwrap();
    let filter = subscribe(mesh.api(1), &key);
    mesh.api(1).set_min_pow(1_000_000.0).await.unwrap();
    // Let the announcement reach node 0.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let send_key = mesh.api(0).generate_sym_key_from_password("pow").unwrap();
    mesh.api(0).post(post(&send_key, "0x01")).await.unwrap();

    let messages = wait_for_messages(mesh.api(1), &filter, 1, Duration::from_millis(300)).await;
    assert!(messages.is_empty());
    // Node 0 had nobody eligible to send to.
    assert_eq!(mesh.nodes[0].node.stats().sent, 0);
    assert_eq!(mesh.nodes[1].node.stats().sent, 1);
    mesh.shutdown().await;
}

#[tokio::test]
async fn empty_password_is_just_another_wrong_key() {
    init_tracing();
    let mesh = TestMesh::new(&[PeerRole::Full, PeerRole::Full]).await;
    mesh.connect_all().await;

    let key = mesh.api(1).generate_sym_key_from_password("right").unwrap();
    let filter = subscribe(mesh.api(1), &key);

    let empty = mesh.api(0).generate_sym_key_from_password("").unwrap();
    assert!(mesh.api(0).has_sym_key(&empty).unwrap());
    mesh.api(0).post(post(&empty, "0x01")).await.unwrap();

    let messages = wait_for_messages(mesh.api(1), &filter, 1, Duration::from_millis(300)).await;
    assert!(messages.is_empty());
    // Still relayed and pooled.
    assert_eq!(mesh.api(1).info().await.unwrap().messages, 1);

    // Both ends on the empty password do agree.
    let empty_filter = subscribe(
        mesh.api(1),
        &mesh.api(1).generate_sym_key_from_password("").unwrap(),
    );
    mesh.api(0).post(post(&empty, "0x02")).await.unwrap();
    let messages = wait_for_messages(mesh.api(1), &empty_filter, 1, WAIT).await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].payload, "0x02");
    mesh.shutdown().await;
}

#[tokio::test]
async fn late_peer_is_synced_from_pool() {
    init_tracing();
    let mesh = TestMesh::new(&[PeerRole::Full, PeerRole::Full, PeerRole::Full]).await;
    mesh.connect(0, 1).await;

    let late_key = mesh.api(2).generate_sym_key_from_password("late").unwrap();
    let filter = subscribe(mesh.api(2), &late_key);

    let send_key = mesh.api(0).generate_sym_key_from_password("late").unwrap();
    mesh.api(0).post(post(&send_key, "0x6c617465")).await.unwrap();

    // Node 1 pools it while node 2 is still offline.
    let deadline = tokio::time::Instant::now() + WAIT;
    while mesh.api(1).info().await.unwrap().messages == 0 {
        assert!(tokio::time::Instant::now() < deadline, "node 1 never pooled the envelope");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(mesh.api(2).info().await.unwrap().messages, 0);

    mesh.connect(1, 2).await;
    let synced = mesh.nodes[1].node.sync_peer(&mesh.nodes[2].peer_id()).await.unwrap();
    assert_eq!(synced, 1);

    let messages = wait_for_messages(mesh.api(2), &filter, 1, WAIT).await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].payload, "0x6c617465");
    assert_eq!(mesh.api(2).info().await.unwrap().messages, 1);

    // Node 2 already holds it, so a second sync has nothing to send.
    assert_eq!(mesh.nodes[1].node.sync_peer(&mesh.nodes[2].peer_id()).await.unwrap(), 0);
    mesh.shutdown().await;
}
