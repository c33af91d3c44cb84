//! TCP listener and top-level server wiring.
//!
//! This module:
//! - Listens on the configured address/port.
//! - Loads the stored snapshot.
//! - Accepts new TCP connections, assigns each a `SessionId`, admits it
//!   to the registry and spawns its session task.
//!
//! The per-session logic and the roster fan-out live in `session` and
//! `broadcast` respectively.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::ServerError;
use crate::session::Session;
use crate::snapshot::SnapshotStore;
use crate::state::ServerState;
use crate::types::SessionId;

/// Global-ish counter for assigning unique `SessionId`s.
static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

fn next_session_id() -> SessionId {
    let id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
    SessionId(id)
}

/// Back-off after a failed `accept` (e.g. out of file descriptors).
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// A bound, not yet running, server.
pub struct Server {
    listener: TcpListener,
    state: Arc<ServerState>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    /// Load the snapshot and bind the listening socket.
    pub async fn bind(config: Config) -> Result<Self, ServerError> {
        let snapshot = SnapshotStore::open(config.snapshot_path.clone()).await?;

        let addr = config.socket_addr_string();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            listener,
            state: Arc::new(ServerState::new(config, snapshot)),
            shutdown_tx,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Shared state, for inspection (registry, snapshot).
    pub fn state(&self) -> Arc<ServerState> {
        self.state.clone()
    }

    /// Sending on this stops the accept loop and closes every session.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Run the accept loop until shutdown is signalled.
    pub async fn run(self) -> Result<(), ServerError> {
        let Server {
            listener,
            state,
            shutdown_tx,
        } = self;

        info!(addr = %listener.local_addr()?, "listening");
        let mut shutdown = shutdown_tx.subscribe();

        loop {
            let (stream, peer_addr) = tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!("accept failed: {}", e);
                        tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                        continue;
                    }
                },
                _ = shutdown.recv() => {
                    info!("shutdown signal, stopping accept loop");
                    break;
                }
            };

            let current = state.registry.len().await;
            if current >= state.config.max_clients {
                warn!(
                    peer = %peer_addr,
                    max_clients = state.config.max_clients,
                    "rejecting connection: max_clients reached"
                );
                // Just drop the stream; client will see the connection closed.
                continue;
            }

            if let Err(e) = stream.set_nodelay(true) {
                warn!(peer = %peer_addr, "set_nodelay failed: {}", e);
            }

            let id = next_session_id();
            info!(session = %id, peer = %peer_addr, "accepted connection");

            let mut session = Session::new(id, peer_addr);
            session.admit(&state).await;

            let state = state.clone();
            let session_shutdown = shutdown_tx.subscribe();
            tokio::spawn(async move {
                session.run(stream, state, session_shutdown).await;
            });
        }

        Ok(())
    }
}

/// Run the TCP server with the given configuration until Ctrl-C.
pub async fn run(config: Config) -> Result<(), ServerError> {
    let server = Server::bind(config).await?;
    let shutdown = server.shutdown_handle();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown.send(());
        }
    });

    server.run().await
}
