//! fleet-core
//!
//! Transport-agnostic building blocks for fleet record synchronization:
//! - messages exchanged between clients and the broadcast server
//! - connection / session lifecycle states
//! - the local record collection collaborator contract

pub mod collection;
pub mod error;
pub mod messages;
pub mod state;

pub use collection::RecordCollection;
pub use error::CollectionError;
pub use messages::{Message, MessageKind};
pub use state::{ConnectionState, SessionState};
