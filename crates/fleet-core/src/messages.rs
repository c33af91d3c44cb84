//! Message types shared by the sync client and server.
//!
//! These are **transport-agnostic** logical messages. The textual
//! prefixes and the framing that carry them over TCP live in the
//! `fleet-protocol` crate; this module is purely logical.
//!
//! Payloads (`PushPayload` / `PullResponse`) are opaque: the sync layer
//! hands them to and from the record collection unchanged.

use std::net::SocketAddr;

use bytes::Bytes;

/// A single logical message on a sync connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Greeting sent once by the server right after accept.
    Welcome(String),

    /// Current set of connected peers, broadcast whenever the registry changes.
    RosterUpdate(Vec<SocketAddr>),

    /// Client → server: replace the stored snapshot with this payload.
    PushPayload(Bytes),

    /// Client → server: ask for the stored snapshot.
    PullRequest,

    /// Server → client: the stored snapshot (empty-list payload if none).
    PullResponse(Bytes),

    /// Client → server keep-alive. Never answered.
    Ping,
}

/// Payload-free discriminant of [`Message`], handy for logging and routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Welcome,
    RosterUpdate,
    PushPayload,
    PullRequest,
    PullResponse,
    Ping,
}

impl Message {
    /// Convenience constructor for a push of `payload`.
    pub fn push(payload: impl Into<Bytes>) -> Self {
        Message::PushPayload(payload.into())
    }

    /// Convenience constructor for a pull response carrying `payload`.
    pub fn pull_response(payload: impl Into<Bytes>) -> Self {
        Message::PullResponse(payload.into())
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Welcome(_) => MessageKind::Welcome,
            Message::RosterUpdate(_) => MessageKind::RosterUpdate,
            Message::PushPayload(_) => MessageKind::PushPayload,
            Message::PullRequest => MessageKind::PullRequest,
            Message::PullResponse(_) => MessageKind::PullResponse,
            Message::Ping => MessageKind::Ping,
        }
    }

    /// True for messages only a server is expected to send.
    pub fn is_server_to_client(&self) -> bool {
        matches!(
            self,
            Message::Welcome(_) | Message::RosterUpdate(_) | Message::PullResponse(_)
        )
    }

    /// True for notifications that are shown to the user as they arrive
    /// (as opposed to replies awaited by a specific request).
    pub fn is_notification(&self) -> bool {
        matches!(self, Message::Welcome(_) | Message::RosterUpdate(_))
    }

    /// Size of the opaque payload, if this message carries one.
    pub fn payload_len(&self) -> Option<usize> {
        match self {
            Message::PushPayload(p) | Message::PullResponse(p) => Some(p.len()),
            _ => None,
        }
    }
}
