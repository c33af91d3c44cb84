// crates/fleet-client/tests/common/mod.rs
//
// Shared harness: a real fleet-server on loopback plus helpers for
// draining client events.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use fleet_client::{ClientConfig, ClientEvent, ConnectionManager, EventRx};
use fleet_server::{Config, Server};
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;

pub const STEP_TIMEOUT: Duration = Duration::from_secs(5);

pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: broadcast::Sender<()>,
}

pub async fn start_server() -> TestServer {
    let config = Config {
        bind_addr: "127.0.0.1".to_string(),
        port: 0,
        snapshot_path: None,
        ..Config::default()
    };
    let server = Server::bind(config).await.unwrap();
    let addr = server.local_addr().unwrap();
    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        server.run().await.unwrap();
    });
    TestServer { addr, shutdown }
}

pub fn client_config() -> ClientConfig {
    ClientConfig {
        host: "127.0.0.1".to_string(),
        connect_timeout_ms: 2_000,
        response_timeout_ms: 2_000,
        heartbeat_interval_secs: 0,
        ..ClientConfig::default()
    }
}

pub fn manager(config: ClientConfig) -> (ConnectionManager, EventRx) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ConnectionManager::new(config, tx), rx)
}

pub async fn next_event(events: &mut EventRx) -> ClientEvent {
    timeout(STEP_TIMEOUT, events.recv())
        .await
        .expect("timed out waiting for a client event")
        .expect("event channel closed")
}

/// Skip events until a roster satisfying `pred` arrives.
pub async fn roster_until(
    events: &mut EventRx,
    pred: impl Fn(&[SocketAddr]) -> bool,
) -> Vec<SocketAddr> {
    loop {
        if let ClientEvent::RosterChanged(peers) = next_event(events).await {
            if pred(&peers) {
                return peers;
            }
        }
    }
}

/// A port nothing is listening on.
pub async fn closed_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}
