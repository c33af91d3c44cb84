// crates/fleet-client/src/connection.rs

//! Client side of a sync connection.
//!
//! A [`Connection`] owns one TCP stream and two background tasks:
//!
//! - the receive loop, the *only* reader of the socket. Greetings and
//!   rosters become [`ClientEvent`]s; anything else is handed to whichever
//!   request is waiting for a reply.
//! - a keep-alive task that sends `PING` periodically so the server's idle
//!   timeout only catches peers that are really gone.
//!
//! Dropping the last handle without `close` aborts both tasks, which
//! releases the socket.
//!
//! [`ConnectionManager`] wraps dialing, argument validation and the
//! connect/disconnect lifecycle around it.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, Weak};
use std::time::Duration;

use bytes::Bytes;
use chrono::Local;
use fleet_core::{ConnectionState, Message};
use fleet_protocol::text_codec::{is_notification_body, preview};
use fleet_protocol::{decode_message, FrameCodec, ProtocolError};
use futures::{SinkExt, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout, Instant};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::events::{ClientEvent, EventTx};

/// How long `close` waits for the server to acknowledge our half-close.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

type Reply = Result<Message, ProtocolError>;

/// Where the next non-notification message goes.
#[derive(Default)]
struct ReplySlot {
    waiter: Option<oneshot::Sender<Reply>>,
    /// Replies still owed to requests that timed out. Each one is dropped
    /// on arrival instead of answering a later request.
    abandoned: usize,
}

/// The part of a connection the receive loop shares with the handles.
struct Link {
    peer_addr: SocketAddr,
    replies: Mutex<ReplySlot>,
    state: watch::Sender<ConnectionState>,
    events: EventTx,
}

impl Link {
    /// Leave the Connected state. Only the first call emits `Disconnected`.
    fn finish(&self, end: ConnectionState) {
        let previous = self.state.send_replace(end);
        if previous == ConnectionState::Connected {
            let _ = self.events.send(ClientEvent::Disconnected);
        }
    }

    /// Forget any waiter; a dropped waiter wakes its request with `Closed`.
    async fn reset_replies(&self) {
        *self.replies.lock().await = ReplySlot::default();
    }
}

/// Owned by the handles only, so it drops with the last of them.
struct Shared {
    local_addr: SocketAddr,
    link: Arc<Link>,
    writer: Mutex<FramedWrite<OwnedWriteHalf, FrameCodec>>,
    /// One request in flight at a time.
    request_lock: Mutex<()>,
    closed: AtomicBool,
    tasks: std::sync::Mutex<Vec<JoinHandle<()>>>,
    response_timeout: Duration,
}

impl Shared {
    fn take_tasks(&self) -> Vec<JoinHandle<()>> {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *tasks)
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let tasks = self.tasks.get_mut().unwrap_or_else(PoisonError::into_inner);
        for task in tasks.drain(..) {
            task.abort();
        }
    }
}

/// Handle to a live (or formerly live) connection. Cheap to clone.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Shared>,
}

impl Connection {
    /// Wrap a freshly dialed stream and start its background tasks.
    ///
    /// `ConnectionEstablished` is emitted before the receive loop starts,
    /// so the owner always hears about the connection before its traffic.
    pub(crate) fn start(
        stream: TcpStream,
        config: &ClientConfig,
        events: EventTx,
    ) -> io::Result<Connection> {
        let local_addr = stream.local_addr()?;
        let peer_addr = stream.peer_addr()?;
        let codec = FrameCodec::new(config.max_frame_len);
        let (read_half, write_half) = stream.into_split();
        let (state, _) = watch::channel(ConnectionState::Connected);

        let link = Arc::new(Link {
            peer_addr,
            replies: Mutex::new(ReplySlot::default()),
            state,
            events: events.clone(),
        });
        let connection = Connection {
            inner: Arc::new(Shared {
                local_addr,
                link: link.clone(),
                writer: Mutex::new(FramedWrite::new(write_half, codec)),
                request_lock: Mutex::new(()),
                closed: AtomicBool::new(false),
                tasks: std::sync::Mutex::new(Vec::new()),
                response_timeout: config.response_timeout(),
            }),
        };

        let _ = events.send(ClientEvent::ConnectionEstablished(connection.clone()));

        let mut tasks = vec![tokio::spawn(receive_loop(
            link,
            FramedRead::new(read_half, codec),
        ))];
        if let Some(period) = config.heartbeat_interval() {
            tasks.push(tokio::spawn(heartbeat_loop(
                Arc::downgrade(&connection.inner),
                period,
            )));
        }
        *connection
            .inner
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = tasks;

        Ok(connection)
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.inner.link.peer_addr
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.link.state.borrow()
    }

    /// Connected and not yet closed by us.
    pub fn is_open(&self) -> bool {
        !self.inner.closed.load(Ordering::SeqCst) && self.state().is_connected()
    }

    /// Resolves once the connection has left the Connected state.
    pub async fn closed(&self) {
        let mut rx = self.inner.link.state.subscribe();
        let _ = rx.wait_for(|state| !state.is_connected()).await;
    }

    /// Write one message.
    pub async fn send(&self, msg: Message) -> Result<(), ClientError> {
        if !self.is_open() {
            return Err(ClientError::NotConnected);
        }

        let kind = msg.kind();
        let mut writer = self.inner.writer.lock().await;
        writer.send(msg).await?;
        debug!(?kind, "sent");
        Ok(())
    }

    /// Write `msg` and wait for the next message that is not a greeting
    /// or roster. Requests on one connection are served one at a time.
    ///
    /// A reply that turns up after its request timed out is discarded, so
    /// it can never answer a later request.
    pub async fn request(&self, msg: Message) -> Result<Message, ClientError> {
        let _turn = self.inner.request_lock.lock().await;
        let link = &self.inner.link;

        let (tx, rx) = oneshot::channel();
        link.replies.lock().await.waiter = Some(tx);

        // Checked after registering, so a receive loop that is just exiting
        // either sees our waiter or we see its final state.
        if !self.is_open() {
            link.replies.lock().await.waiter.take();
            return Err(ClientError::NotConnected);
        }

        if let Err(e) = self.send(msg).await {
            link.replies.lock().await.waiter.take();
            return Err(e);
        }

        match timeout(self.inner.response_timeout, rx).await {
            Ok(Ok(reply)) => Ok(reply?),
            Ok(Err(_)) => Err(ClientError::Closed),
            Err(_) => {
                let mut slot = link.replies.lock().await;
                // Still unanswered: the reply may yet arrive.
                if slot.waiter.take().is_some() {
                    slot.abandoned += 1;
                }
                Err(ClientError::Timeout(self.inner.response_timeout))
            }
        }
    }

    /// Close the connection. Safe to call any number of times, and after
    /// the server has already gone away.
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        // Half-close first so the server reads everything we wrote, then
        // give it a moment to close its side.
        match timeout(CLOSE_GRACE, self.inner.writer.lock()).await {
            Ok(mut writer) => {
                if let Err(e) = writer.get_mut().shutdown().await {
                    debug!("half-close failed: {}", e);
                }
            }
            Err(_) => debug!("writer busy, skipping half-close"),
        }
        let _ = timeout(CLOSE_GRACE, self.closed()).await;

        for task in self.inner.take_tasks() {
            task.abort();
        }
        self.inner.link.finish(ConnectionState::Disconnected);
        self.inner.link.reset_replies().await;

        info!(peer = %self.inner.link.peer_addr, "disconnected");
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("local_addr", &self.inner.local_addr)
            .field("peer_addr", &self.inner.link.peer_addr)
            .field("state", &self.state())
            .finish()
    }
}

async fn receive_loop(link: Arc<Link>, mut reader: FramedRead<OwnedReadHalf, FrameCodec>) {
    let end = loop {
        match reader.next().await {
            Some(Ok(body)) => route(&link, body).await,
            Some(Err(e)) => {
                debug!(peer = %link.peer_addr, "receive loop stopped: {}", e);
                break ConnectionState::Failed;
            }
            None => {
                debug!(peer = %link.peer_addr, "server closed the connection");
                break ConnectionState::Disconnected;
            }
        }
    };

    link.finish(end);
    link.reset_replies().await;
}

async fn route(link: &Link, body: Bytes) {
    let decoded = decode_message(body.clone());
    // A notification that fails to decode is still shown, never taken as a reply.
    let notification = match &decoded {
        Ok(msg) => msg.is_notification(),
        Err(_) => is_notification_body(&body),
    };

    if notification {
        let text = String::from_utf8_lossy(&body).into_owned();
        let _ = link.events.send(ClientEvent::MessageReceived {
            text,
            received_at: Local::now(),
        });
        match decoded {
            Ok(Message::RosterUpdate(peers)) => {
                debug!(peers = peers.len(), "roster changed");
                let _ = link.events.send(ClientEvent::RosterChanged(peers));
            }
            Ok(_) => {}
            Err(e) => warn!("malformed notification from server: {}", e),
        }
        return;
    }

    let mut slot = link.replies.lock().await;
    if slot.abandoned > 0 {
        slot.abandoned -= 1;
        debug!(body = %preview(&body), "dropping late reply to a timed-out request");
        return;
    }
    match slot.waiter.take() {
        Some(waiter) => {
            let _ = waiter.send(decoded);
        }
        None => warn!(body = %preview(&body), "unsolicited message from server"),
    }
}

async fn heartbeat_loop(shared: Weak<Shared>, period: Duration) {
    let mut ticker = interval_at(Instant::now() + period, period);
    loop {
        ticker.tick().await;

        let Some(inner) = shared.upgrade() else {
            break;
        };
        let connection = Connection { inner };
        if !connection.is_open() {
            break;
        }
        if let Err(e) = connection.send(Message::Ping).await {
            debug!("keep-alive failed: {}", e);
            break;
        }
    }
}

/// Owns the connect/disconnect lifecycle of a single server connection.
pub struct ConnectionManager {
    config: ClientConfig,
    events: EventTx,
    connection: Option<Connection>,
}

impl ConnectionManager {
    pub fn new(config: ClientConfig, events: EventTx) -> Self {
        Self {
            config,
            events,
            connection: None,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// State of the current connection; `Disconnected` when there is none.
    pub fn state(&self) -> ConnectionState {
        self.connection
            .as_ref()
            .map_or(ConnectionState::Disconnected, Connection::state)
    }

    /// The live connection, if there is one.
    pub fn connection(&self) -> Result<&Connection, ClientError> {
        match &self.connection {
            Some(connection) if connection.is_open() => Ok(connection),
            _ => Err(ClientError::NotConnected),
        }
    }

    /// Validate `host`/`port`, then dial.
    ///
    /// Bad arguments fail with [`ClientError::Validation`] before any I/O.
    /// A failed dial emits [`ClientEvent::ConnectionFailed`] and leaves the
    /// manager disconnected. An existing connection is closed first.
    pub async fn connect(&mut self, host: &str, port: &str) -> Result<Connection, ClientError> {
        let port = parse_port(port)?;
        let host = host.trim();
        if host.is_empty() {
            return Err(ClientError::Validation("host must not be empty".to_string()));
        }

        if let Some(previous) = self.connection.take() {
            previous.close().await;
        }

        let addr = display_addr(host, port);
        info!(%addr, "connecting");

        let dialed = match timeout(self.config.connect_timeout(), TcpStream::connect((host, port))).await {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("no answer within {:?}", self.config.connect_timeout()),
            )),
        };
        let started = dialed.and_then(|stream| {
            if let Err(e) = stream.set_nodelay(true) {
                warn!("set_nodelay failed: {}", e);
            }
            Connection::start(stream, &self.config, self.events.clone())
        });

        match started {
            Ok(connection) => {
                info!(%addr, local = %connection.local_addr(), "connected");
                self.connection = Some(connection.clone());
                Ok(connection)
            }
            Err(source) => {
                warn!(%addr, "connection failed: {}", source);
                let _ = self
                    .events
                    .send(ClientEvent::ConnectionFailed(source.to_string()));
                Err(ClientError::Connection { addr, source })
            }
        }
    }

    /// Close the current connection, if any. Calling this repeatedly, or
    /// after the server dropped us, is fine.
    pub async fn disconnect(&mut self) -> Result<(), ClientError> {
        if let Some(connection) = self.connection.take() {
            connection.close().await;
        }
        Ok(())
    }
}

/// A port is a whole number in `1..=65535`.
pub fn parse_port(port: &str) -> Result<u16, ClientError> {
    match port.trim().parse::<u16>() {
        Ok(0) | Err(_) => Err(ClientError::Validation(format!(
            "port must be a number between 1 and 65535, got {:?}",
            port
        ))),
        Ok(port) => Ok(port),
    }
}

fn display_addr(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}
