// crates/fleet-client/src/sync.rs

//! Push/pull of a whole record collection over a [`Connection`].

use bytes::Bytes;
use fleet_core::{Message, MessageKind, RecordCollection};
use fleet_protocol::ProtocolError;
use tracing::{info, warn};

use crate::connection::Connection;
use crate::error::ClientError;

/// Sends a raw, already-serialized collection to the server.
///
/// The server answers pushes with nothing, so this returns once the frame
/// is written.
pub async fn push_payload(connection: &Connection, payload: Bytes) -> Result<(), ClientError> {
    if !connection.is_open() {
        return Err(ClientError::NotConnected);
    }
    let len = payload.len();
    connection.send(Message::PushPayload(payload)).await?;
    info!(bytes = len, "collection pushed");
    Ok(())
}

/// Keeps a local collection in step with the server's snapshot.
pub struct SyncCoordinator<C> {
    collection: C,
}

impl<C: RecordCollection> SyncCoordinator<C> {
    pub fn new(collection: C) -> Self {
        Self { collection }
    }

    pub fn collection(&self) -> &C {
        &self.collection
    }

    pub fn collection_mut(&mut self) -> &mut C {
        &mut self.collection
    }

    pub fn into_inner(self) -> C {
        self.collection
    }

    /// Replace the server's snapshot with the local collection.
    pub async fn push_collection(&self, connection: &Connection) -> Result<(), ClientError> {
        if !connection.is_open() {
            return Err(ClientError::NotConnected);
        }
        let payload = self.collection.serialize()?;
        push_payload(connection, payload).await
    }

    /// Fetch the server's snapshot, replace the local records with it and
    /// save them.
    ///
    /// Nothing local changes unless the whole reply parses.
    pub async fn pull_collection(&mut self, connection: &Connection) -> Result<(), ClientError> {
        if !connection.is_open() {
            return Err(ClientError::NotConnected);
        }

        let payload = match connection.request(Message::PullRequest).await? {
            Message::PullResponse(payload) => payload,
            other => {
                warn!(got = ?other.kind(), "unexpected reply to pull request");
                return Err(ProtocolError::UnexpectedMessage {
                    expected: MessageKind::PullResponse,
                    got: other.kind(),
                }
                .into());
            }
        };

        let records = self.collection.deserialize(&payload)?;
        self.collection.replace_all(records);
        self.collection.persist_to_disk()?;
        info!(bytes = payload.len(), "collection pulled");
        Ok(())
    }
}
