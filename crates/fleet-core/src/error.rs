//! Error types for the record collection collaborator.

/// Failures reported by a [`crate::RecordCollection`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum CollectionError {
    /// The local collection could not be turned into a payload.
    #[error("failed to serialize collection: {0}")]
    Serialize(String),

    /// A received payload is not a valid collection.
    #[error("failed to deserialize collection: {0}")]
    Deserialize(String),

    /// Writing the collection to local storage failed.
    #[error("failed to persist collection: {0}")]
    Persist(#[from] std::io::Error),
}
