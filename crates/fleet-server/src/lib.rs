//! fleet-server
//!
//! Multi-client async TCP server that holds the shared fleet snapshot and
//! keeps every connected client informed of who else is connected.

pub mod broadcast;
pub mod config;
pub mod error;
pub mod server;
pub mod snapshot;
pub mod state;
pub mod types;

// internal: driven only by the accept loop
mod session;

pub use config::Config;
pub use error::ServerError;
pub use server::Server;
