//! Client-side error taxonomy.
//!
//! Every variant renders as a sentence a user can act on; the CLI prints
//! them as-is.

use std::io;
use std::time::Duration;

use fleet_core::CollectionError;
use fleet_protocol::ProtocolError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Bad connect arguments. Reported before any I/O.
    #[error("invalid connection parameters: {0}")]
    Validation(String),

    /// The dial failed (refused, unreachable, timed out).
    #[error("could not connect to {addr}: {source}")]
    Connection {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("not connected to a server")]
    NotConnected,

    /// The server sent something other than what was asked for.
    #[error("protocol error: {0}")]
    Protocol(ProtocolError),

    #[error("connection i/o failed: {0}")]
    Io(#[from] io::Error),

    #[error("no reply from server within {0:?}")]
    Timeout(Duration),

    /// The connection went away while waiting for a reply.
    #[error("connection closed before the server replied")]
    Closed,

    #[error(transparent)]
    Collection(#[from] CollectionError),

    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl From<ProtocolError> for ClientError {
    fn from(e: ProtocolError) -> Self {
        match e {
            ProtocolError::Io(e) => ClientError::Io(e),
            other => ClientError::Protocol(other),
        }
    }
}
