//! State shared by the accept loop and every session.

use tokio::sync::Mutex;

use crate::config::Config;
use crate::snapshot::SnapshotStore;
use crate::types::Registry;

#[derive(Debug)]
pub struct ServerState {
    pub config: Config,
    pub registry: Registry,
    pub snapshot: SnapshotStore,

    /// Held while a roster is built and queued, so rosters reach every
    /// session in the order the registry changed.
    pub(crate) broadcast_lock: Mutex<()>,
}

impl ServerState {
    pub fn new(config: Config, snapshot: SnapshotStore) -> Self {
        Self {
            config,
            registry: Registry::new(),
            snapshot,
            broadcast_lock: Mutex::new(()),
        }
    }
}
