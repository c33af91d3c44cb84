// crates/fleet-server/tests/common/mod.rs
//
// Loopback harness shared by the server integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use fleet_core::Message;
use fleet_protocol::{decode_message, FrameCodec};
use fleet_server::state::ServerState;
use fleet_server::{Config, Server};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::time::timeout;
use tokio_util::codec::Framed;

pub const STEP_TIMEOUT: Duration = Duration::from_secs(5);

pub fn test_config() -> Config {
    Config {
        bind_addr: "127.0.0.1".to_string(),
        port: 0,
        snapshot_path: None,
        ..Config::default()
    }
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: Arc<ServerState>,
    pub shutdown: broadcast::Sender<()>,
    pub task: tokio::task::JoinHandle<()>,
}

pub async fn start(config: Config) -> TestServer {
    let server = Server::bind(config).await.unwrap();
    let addr = server.local_addr().unwrap();
    let state = server.state();
    let shutdown = server.shutdown_handle();
    let task = tokio::spawn(async move {
        server.run().await.unwrap();
    });
    TestServer {
        addr,
        state,
        shutdown,
        task,
    }
}

/// A raw framed client, speaking the wire protocol directly.
pub struct Peer {
    pub framed: Framed<TcpStream, FrameCodec>,
    pub local: SocketAddr,
}

impl Peer {
    pub async fn connect(addr: SocketAddr) -> Peer {
        let stream = TcpStream::connect(addr).await.unwrap();
        let local = stream.local_addr().unwrap();
        Peer {
            framed: Framed::new(stream, FrameCodec::default()),
            local,
        }
    }

    /// Connect and consume the greeting.
    pub async fn join(addr: SocketAddr) -> Peer {
        let mut peer = Peer::connect(addr).await;
        peer.expect_welcome().await;
        peer
    }

    pub async fn send(&mut self, msg: Message) {
        self.framed.send(msg).await.unwrap();
    }

    pub async fn send_raw(&mut self, body: &'static [u8]) {
        self.framed.send(Bytes::from_static(body)).await.unwrap();
    }

    /// Next decoded message, or `None` once the server closed the stream.
    pub async fn recv(&mut self) -> Option<Message> {
        let frame = timeout(STEP_TIMEOUT, self.framed.next())
            .await
            .expect("timed out waiting for a message")?;
        match frame {
            Ok(body) => Some(decode_message(body).unwrap()),
            Err(_) => None,
        }
    }

    pub async fn expect_welcome(&mut self) {
        match self.recv().await {
            Some(Message::Welcome(text)) => assert_eq!(text, "Welcome to the server!\n"),
            other => panic!("expected welcome, got {:?}", other),
        }
    }

    /// Skip messages until a roster satisfying `pred` arrives.
    pub async fn roster_until(&mut self, pred: impl Fn(&[SocketAddr]) -> bool) -> Vec<SocketAddr> {
        loop {
            match self.recv().await {
                Some(Message::RosterUpdate(peers)) if pred(&peers) => return peers,
                Some(_) => continue,
                None => panic!("connection closed while waiting for roster"),
            }
        }
    }

    /// Drain until nothing arrives for `quiet`; the last roster seen.
    pub async fn last_roster(&mut self, quiet: Duration) -> Option<Vec<SocketAddr>> {
        let mut last = None;
        while let Ok(Some(frame)) = timeout(quiet, self.framed.next()).await {
            if let Message::RosterUpdate(peers) = decode_message(frame.unwrap()).unwrap() {
                last = Some(peers);
            }
        }
        last
    }

    /// Send a pull and return the payload, skipping roster traffic.
    pub async fn pull(&mut self) -> Bytes {
        self.send(Message::PullRequest).await;
        loop {
            match self.recv().await {
                Some(Message::PullResponse(payload)) => return payload,
                Some(Message::RosterUpdate(_)) => continue,
                other => panic!("expected pull response, got {:?}", other),
            }
        }
    }

    /// Drain until the server closes the connection.
    pub async fn expect_closed(&mut self) {
        while self.recv().await.is_some() {}
    }
}

/// Poll `check` until it holds, for at most `STEP_TIMEOUT`.
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + STEP_TIMEOUT;
    while !check().await {
        assert!(tokio::time::Instant::now() < deadline, "condition never held");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
