//! Notifications delivered from the connection's background tasks to
//! whoever owns the connection (a UI, the CLI, a test).
//!
//! Events travel over an unbounded channel and are drained by the owner on
//! its own task; background tasks never touch owner state directly.

use std::net::SocketAddr;

use chrono::{DateTime, Local};
use tokio::sync::mpsc;

use crate::connection::Connection;

#[derive(Debug)]
pub enum ClientEvent {
    /// Dial succeeded; carries the live handle.
    ConnectionEstablished(Connection),

    /// Dial failed; human-readable cause.
    ConnectionFailed(String),

    /// A greeting or roster arrived, as the text the server sent.
    MessageReceived {
        text: String,
        received_at: DateTime<Local>,
    },

    /// The set of connected peers changed.
    RosterChanged(Vec<SocketAddr>),

    /// The connection is gone, closed by either side.
    Disconnected,
}

pub type EventTx = mpsc::UnboundedSender<ClientEvent>;
pub type EventRx = mpsc::UnboundedReceiver<ClientEvent>;
