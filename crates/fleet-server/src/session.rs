// crates/fleet-server/src/session.rs

//! Per-connection session handler.
//!
//! State machine: `Accepted → Greeting → Serving → Closed`.
//!
//! - Greeting: the welcome is queued *before* the session joins the
//!   registry, so a client always sees it ahead of any roster. Then a
//!   roster goes out to everyone.
//! - Serving: read a frame, decode, dispatch. A body that does not decode
//!   is logged and dropped; the connection stays up.
//! - Closed: entered on EOF, read error, bad framing, idle timeout, writer
//!   failure or server shutdown. The session leaves the registry and a new
//!   roster goes out.
//!
//! Each session has a reader (this task) and a writer task fed by an
//! unbounded channel, so broadcasts never wait on a slow socket.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use fleet_core::{Message, SessionState};
use fleet_protocol::text_codec::preview;
use fleet_protocol::wire_types::WELCOME_TEXT;
use fleet_protocol::{decode_message, FrameCodec, ProtocolError};
use futures::{SinkExt, StreamExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info, warn};

use crate::broadcast::broadcast_roster;
use crate::state::ServerState;
use crate::types::{OutboundRx, OutboundTx, SessionEntry, SessionId};

/// Why a session ended.
#[derive(Debug)]
enum CloseReason {
    PeerClosed,
    ReadFailed(std::io::Error),
    BadFraming(ProtocolError),
    IdleTimeout(Duration),
    WriterGone,
    Shutdown,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::PeerClosed => write!(f, "peer closed the connection"),
            CloseReason::ReadFailed(e) => write!(f, "read error: {}", e),
            CloseReason::BadFraming(e) => write!(f, "framing error: {}", e),
            CloseReason::IdleTimeout(d) => write!(f, "idle for {}s", d.as_secs()),
            CloseReason::WriterGone => write!(f, "write side failed"),
            CloseReason::Shutdown => write!(f, "server shutting down"),
        }
    }
}

/// One accepted connection.
pub struct Session {
    id: SessionId,
    peer_addr: SocketAddr,
    state: SessionState,
    outbound: OutboundTx,
    // Handed to the writer task when the session starts running.
    outbound_rx: Option<OutboundRx>,
}

impl Session {
    pub fn new(id: SessionId, peer_addr: SocketAddr) -> Self {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        Self {
            id,
            peer_addr,
            state: SessionState::Accepted,
            outbound,
            outbound_rx: Some(outbound_rx),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Queue the welcome and make the session visible to broadcasts.
    ///
    /// Runs on the accept loop, before the session task is spawned.
    pub async fn admit(&mut self, server: &ServerState) {
        self.transition(SessionState::Greeting);

        // Cannot fail: we still own the receiver.
        let _ = self.outbound.send(Message::Welcome(WELCOME_TEXT.to_string()));

        server
            .registry
            .insert(
                self.id,
                SessionEntry {
                    peer_addr: self.peer_addr,
                    outbound: self.outbound.clone(),
                },
            )
            .await;
    }

    /// Run the session until it closes, then clean up after it.
    pub async fn run(
        mut self,
        stream: TcpStream,
        server: Arc<ServerState>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let Some(outbound_rx) = self.outbound_rx.take() else {
            return;
        };

        let codec = FrameCodec::new(server.config.max_frame_len);
        let idle = server.config.idle_timeout();
        let (read_half, write_half) = stream.into_split();

        let mut reader = FramedRead::new(read_half, codec);
        let mut writer_task = tokio::spawn(write_loop(
            self.id,
            FramedWrite::new(write_half, codec),
            outbound_rx,
        ));

        broadcast_roster(&server).await;
        self.transition(SessionState::Serving);

        let reason = loop {
            tokio::select! {
                _ = shutdown.recv() => break CloseReason::Shutdown,
                _ = &mut writer_task => break CloseReason::WriterGone,
                frame = next_frame(&mut reader, idle) => match frame {
                    Ok(body) => self.dispatch(body, &server).await,
                    Err(reason) => break reason,
                },
            }
        };

        self.transition(SessionState::Closed);
        info!(session = %self.id, peer = %self.peer_addr, "session closed: {}", reason);

        writer_task.abort();
        server.registry.remove(self.id).await;
        broadcast_roster(&server).await;
    }

    async fn dispatch(&self, body: Bytes, server: &ServerState) {
        let raw_len = body.len();
        let msg = match decode_message(body.clone()) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(
                    session = %self.id,
                    peer = %self.peer_addr,
                    body = %preview(&body),
                    "discarding malformed message: {}", e
                );
                return;
            }
        };

        if msg.is_server_to_client() {
            warn!(
                session = %self.id,
                peer = %self.peer_addr,
                kind = ?msg.kind(),
                bytes = raw_len,
                "ignoring server-to-client message sent by a client"
            );
            return;
        }

        match msg {
            Message::PushPayload(payload) => {
                debug!(session = %self.id, bytes = payload.len(), "snapshot pushed");
                if let Err(e) = server.snapshot.replace(payload).await {
                    error!(session = %self.id, "failed to persist snapshot: {}", e);
                }
            }
            Message::PullRequest => {
                let payload = server.snapshot.current_or_empty().await;
                debug!(session = %self.id, bytes = payload.len(), "snapshot pulled");
                // A failed send means the writer is gone; the select loop notices.
                let _ = self.outbound.send(Message::PullResponse(payload));
            }
            Message::Ping => {
                debug!(session = %self.id, "keep-alive");
            }
            // Filtered out above.
            Message::Welcome(_) | Message::RosterUpdate(_) | Message::PullResponse(_) => {}
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal session transition {} -> {}",
            self.state,
            next
        );
        debug!(session = %self.id, from = %self.state, to = %next, "session state");
        self.state = next;
    }
}

/// Wait for the next frame body, bounded by the idle timeout.
async fn next_frame(
    reader: &mut FramedRead<OwnedReadHalf, FrameCodec>,
    idle: Option<Duration>,
) -> Result<Bytes, CloseReason> {
    let next = match idle {
        Some(limit) => match timeout(limit, reader.next()).await {
            Ok(next) => next,
            Err(_) => return Err(CloseReason::IdleTimeout(limit)),
        },
        None => reader.next().await,
    };

    match next {
        Some(Ok(body)) => Ok(body),
        Some(Err(ProtocolError::Io(e))) => Err(CloseReason::ReadFailed(e)),
        Some(Err(e)) => Err(CloseReason::BadFraming(e)),
        None => Err(CloseReason::PeerClosed),
    }
}

/// Writer task: drain the outbound queue onto the socket.
async fn write_loop(
    id: SessionId,
    mut writer: FramedWrite<OwnedWriteHalf, FrameCodec>,
    mut outbound_rx: OutboundRx,
) {
    while let Some(msg) = outbound_rx.recv().await {
        let kind = msg.kind();
        if let Err(e) = writer.send(msg).await {
            warn!(session = %id, ?kind, "write failed: {}", e);
            break;
        }
        debug!(session = %id, ?kind, "sent");
    }
}
