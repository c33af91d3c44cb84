//! Lifecycle states for both ends of a sync connection.

use std::fmt;

/// State of a client-side connection handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No live connection. Initial state, and the state after a clean close.
    #[default]
    Disconnected,

    /// Dial in progress.
    Connecting,

    /// Stream established and receive loop running.
    Connected,

    /// The receive loop stopped on an I/O error.
    Failed,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        self == ConnectionState::Connected
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Server-side session state machine:
/// `Accepted → Greeting → Serving → Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Accepted,
    Greeting,
    Serving,
    Closed,
}

impl SessionState {
    /// Whether `self → next` is a legal transition.
    ///
    /// Any live state may jump straight to `Closed` (the peer can vanish
    /// before the greeting is out).
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Accepted, Greeting) | (Greeting, Serving) | (Accepted | Greeting | Serving, Closed)
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Accepted => "accepted",
            SessionState::Greeting => "greeting",
            SessionState::Serving => "serving",
            SessionState::Closed => "closed",
        };
        f.write_str(s)
    }
}
