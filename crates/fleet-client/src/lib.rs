//! fleet-client
//!
//! Client side of fleet record synchronization: connect to a fleet-server,
//! follow its greeting and roster notifications, and push or pull the
//! shared record collection.

pub mod collection;
pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod sync;

pub use collection::JsonFileCollection;
pub use config::ClientConfig;
pub use connection::{Connection, ConnectionManager};
pub use error::ClientError;
pub use events::{ClientEvent, EventRx, EventTx};
pub use sync::SyncCoordinator;
