//! The local record collection, as seen by the sync layer.
//!
//! The sync layer never looks inside individual records. It only needs to
//! turn the collection into bytes, turn bytes back into a collection, swap
//! the whole collection, and ask for it to be saved.

use bytes::Bytes;

use crate::error::CollectionError;

/// Collaborator contract for whatever owns the vehicle records locally.
pub trait RecordCollection {
    /// Parsed form of a received payload, ready to be swapped in.
    type Records;

    /// Serialize the whole collection into an opaque payload.
    fn serialize(&self) -> Result<Bytes, CollectionError>;

    /// Parse a payload received from the server.
    ///
    /// Must not modify `self`; a payload that fails to parse is never applied.
    fn deserialize(&self, payload: &[u8]) -> Result<Self::Records, CollectionError>;

    /// Replace every record with `records`.
    fn replace_all(&mut self, records: Self::Records);

    /// Save the current collection to local storage.
    fn persist_to_disk(&self) -> Result<(), CollectionError>;
}
