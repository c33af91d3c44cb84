// crates/fleet-server/tests/sessions.rs
mod common;

use std::time::Duration;

use common::{eventually, start, test_config, Peer};
use fleet_core::Message;

#[tokio::test]
async fn greeting_comes_before_any_roster() {
    let server = start(test_config()).await;

    let mut peer = Peer::connect(server.addr).await;
    peer.expect_welcome().await;

    let roster = peer.roster_until(|_| true).await;
    assert_eq!(roster, vec![peer.local]);
}

#[tokio::test]
async fn pull_from_empty_store_returns_empty_list() {
    let server = start(test_config()).await;
    let mut peer = Peer::join(server.addr).await;

    assert_eq!(&peer.pull().await[..], b"[]");
}

#[tokio::test]
async fn pushed_payload_is_served_to_other_clients() {
    let server = start(test_config()).await;

    let mut a = Peer::join(server.addr).await;
    a.send(Message::push(&b"[{\"Brand\":\"Toyota\"}]"[..])).await;
    // Push is fire-and-forget; a pull on the same connection orders after it.
    assert_eq!(&a.pull().await[..], b"[{\"Brand\":\"Toyota\"}]");

    let mut b = Peer::join(server.addr).await;
    assert_eq!(&b.pull().await[..], b"[{\"Brand\":\"Toyota\"}]");
}

#[tokio::test]
async fn last_push_wins() {
    let server = start(test_config()).await;
    let mut a = Peer::join(server.addr).await;
    let mut b = Peer::join(server.addr).await;

    a.send(Message::push(&b"[1]"[..])).await;
    assert_eq!(&a.pull().await[..], b"[1]");
    b.send(Message::push(&b"[2]"[..])).await;
    assert_eq!(&b.pull().await[..], b"[2]");

    assert_eq!(&a.pull().await[..], b"[2]");
}

#[tokio::test]
async fn every_peer_ends_up_with_the_full_roster() {
    const N: usize = 6;
    let server = start(test_config()).await;

    let mut peers = Vec::new();
    for _ in 0..N {
        peers.push(Peer::connect(server.addr).await);
    }
    let mut expected: Vec<_> = peers.iter().map(|p| p.local).collect();
    expected.sort();

    for peer in &mut peers {
        let mut roster = peer.roster_until(|r| r.len() == N).await;
        roster.sort();
        assert_eq!(roster, expected);
    }

    // Nothing after the full roster may contradict it.
    for peer in &mut peers {
        if let Some(mut latest) = peer.last_roster(Duration::from_millis(300)).await {
            latest.sort();
            assert_eq!(latest, expected);
        }
    }

    assert_eq!(server.state.registry.len().await, N);
}

#[tokio::test]
async fn disconnect_is_reflected_in_the_next_roster() {
    let server = start(test_config()).await;

    let a = Peer::join(server.addr).await;
    let mut b = Peer::join(server.addr).await;
    b.roster_until(|r| r.len() == 2).await;

    drop(a);

    let roster = b.roster_until(|r| r.len() == 1).await;
    assert_eq!(roster, vec![b.local]);

    let registry = server.state.registry.clone();
    eventually(|| {
        let registry = registry.clone();
        async move { registry.len().await == 1 }
    })
    .await;
}

#[tokio::test]
async fn malformed_message_does_not_end_the_session() {
    let server = start(test_config()).await;
    let mut peer = Peer::join(server.addr).await;

    peer.send_raw(b"HELLO SERVER").await;
    peer.send_raw(b"").await;
    peer.send_raw(b"Connected clients:\nnonsense\n").await;

    assert_eq!(&peer.pull().await[..], b"[]");
}

#[tokio::test]
async fn server_bound_only_messages_are_ignored() {
    let server = start(test_config()).await;
    let mut peer = Peer::join(server.addr).await;

    // A client pretending to answer a pull must not touch the snapshot.
    peer.send(Message::pull_response(&b"[\"forged\"]"[..])).await;
    peer.send(Message::Ping).await;

    assert_eq!(&peer.pull().await[..], b"[]");
}

#[tokio::test]
async fn oversized_frame_closes_only_the_offending_session() {
    let mut config = test_config();
    config.max_frame_len = 128;
    let server = start(config).await;

    let mut good = Peer::join(server.addr).await;
    let mut bad = Peer::join(server.addr).await;
    good.roster_until(|r| r.len() == 2).await;

    bad.send_raw(&[b'x'; 300]).await;
    bad.expect_closed().await;

    let roster = good.roster_until(|r| r.len() == 1).await;
    assert_eq!(roster, vec![good.local]);
    assert_eq!(&good.pull().await[..], b"[]");
}

#[tokio::test]
async fn connections_beyond_max_clients_are_dropped() {
    let mut config = test_config();
    config.max_clients = 1;
    let server = start(config).await;

    let mut first = Peer::join(server.addr).await;

    let mut second = Peer::connect(server.addr).await;
    assert!(second.recv().await.is_none());

    assert_eq!(&first.pull().await[..], b"[]");
}

#[tokio::test]
async fn idle_sessions_are_reaped_but_pings_keep_them_alive() {
    let mut config = test_config();
    config.idle_timeout_secs = 1;
    let server = start(config).await;

    let mut busy = Peer::join(server.addr).await;
    let mut idle = Peer::join(server.addr).await;

    for _ in 0..4 {
        tokio::time::sleep(Duration::from_millis(400)).await;
        busy.send(Message::Ping).await;
    }

    idle.expect_closed().await;

    let roster = busy.roster_until(|r| r.len() == 1).await;
    assert_eq!(roster, vec![busy.local]);
    assert_eq!(&busy.pull().await[..], b"[]");
}

#[tokio::test]
async fn shutdown_closes_listener_and_sessions() {
    let server = start(test_config()).await;
    let mut peer = Peer::join(server.addr).await;

    server.shutdown.send(()).unwrap();

    peer.expect_closed().await;
    tokio::time::timeout(Duration::from_secs(5), server.task)
        .await
        .expect("accept loop did not stop")
        .unwrap();
}
