//! Roster fan-out.
//!
//! Whenever the registry changes, every live session gets a fresh
//! `RosterUpdate` listing all connected peers, itself included.
//!
//! Nothing here touches a socket: messages are queued on each session's
//! outbound channel and written by that session's writer task. A closed
//! queue means the writer has already died; that session is dropped from
//! the registry and the others still get their copy.

use fleet_core::Message;
use tracing::{debug, info};

use crate::state::ServerState;

/// Queue the current roster to every live session.
///
/// Returns the number of sessions the roster was queued to.
pub async fn broadcast_roster(state: &ServerState) -> usize {
    let (queued, dead) = {
        let _serial = state.broadcast_lock.lock().await;

        // Snapshot of current sessions to minimize lock hold time.
        let sessions = state.registry.snapshot().await;
        let roster = Message::RosterUpdate(sessions.iter().map(|(_, e)| e.peer_addr).collect());

        let mut dead = Vec::new();
        for (id, entry) in &sessions {
            if entry.outbound.send(roster.clone()).is_err() {
                dead.push(*id);
            }
        }

        debug!(sessions = sessions.len(), failed = dead.len(), "roster broadcast");
        (sessions.len() - dead.len(), dead)
    };

    for id in dead {
        if state.registry.remove(id).await {
            info!(session = %id, "dropped session with closed outbound queue");
        }
    }

    queued
}
