//! Shared types for the fleet sync server.
//!
//! This module defines:
//! - `SessionId`: a lightweight handle for connected clients
//! - the outbound channel aliases feeding each session's writer
//! - `Registry`: the lock-protected set of live sessions

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use fleet_core::Message;
use indexmap::IndexMap;
use tokio::sync::{mpsc, RwLock};

/// Identifier for a connected client.
///
/// This is intentionally opaque; we just guarantee uniqueness
/// over the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Outbound messages queued for one session's writer task.
pub type OutboundTx = mpsc::UnboundedSender<Message>;
pub type OutboundRx = mpsc::UnboundedReceiver<Message>;

/// What the registry knows about a live session.
#[derive(Debug, Clone)]
pub struct SessionEntry {
    /// Peer address as seen by the server; this is what rosters list.
    pub peer_addr: SocketAddr,

    /// Queue into the session's writer. Sends fail once the writer is gone.
    pub outbound: OutboundTx,
}

/// Registry of live sessions.
///
/// Insertion order is preserved, so rosters list peers in connect order.
/// Every access goes through the lock; callers that need to do I/O take a
/// [`Registry::snapshot`] first and work on the copy.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    inner: Arc<RwLock<IndexMap<SessionId, SessionEntry>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, id: SessionId, entry: SessionEntry) {
        let mut guard = self.inner.write().await;
        guard.insert(id, entry);
    }

    /// Remove a session. Returns `false` if it was already gone, which makes
    /// double removal (session exit + broadcaster cleanup) harmless.
    pub async fn remove(&self, id: SessionId) -> bool {
        let mut guard = self.inner.write().await;
        guard.shift_remove(&id).is_some()
    }

    /// Point-in-time copy of every live session.
    pub async fn snapshot(&self) -> Vec<(SessionId, SessionEntry)> {
        let guard = self.inner.read().await;
        guard.iter().map(|(id, entry)| (*id, entry.clone())).collect()
    }

    /// Peer addresses of every live session, in connect order.
    pub async fn roster(&self) -> Vec<SocketAddr> {
        let guard = self.inner.read().await;
        guard.values().map(|entry| entry.peer_addr).collect()
    }

    pub async fn contains(&self, id: SessionId) -> bool {
        self.inner.read().await.contains_key(&id)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}
