//! Registry of live sessions, keyed by caller-assigned ids.

use crate::broadcast::BroadcastSession;
use crate::discovery::DiscoverySession;
use crate::session::Session;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use lampion_core::{LampionError, Result, SessionId, SessionKind};
use std::sync::Arc;
use tracing::debug;

/// Owns every live session, one map per kind.
///
/// At most one session per id and kind may be active; a second initialize
/// for an active id is rejected rather than overwriting the session. Removal
/// is idempotent, and sessions remove themselves through the completion
/// callback they receive at creation.
#[derive(Default)]
pub struct SessionRegistry {
    broadcasts: DashMap<SessionId, Arc<BroadcastSession>>,
    discoveries: DashMap<SessionId, Arc<DiscoverySession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a broadcast session under its id.
    pub fn insert_broadcast(&self, id: SessionId, session: Arc<BroadcastSession>) -> Result<()> {
        match self.broadcasts.entry(id) {
            Entry::Occupied(_) => Err(LampionError::DuplicateId {
                kind: SessionKind::Broadcast,
                id,
            }),
            Entry::Vacant(entry) => {
                entry.insert(session);
                Ok(())
            }
        }
    }

    /// Stores a discovery session under its id.
    pub fn insert_discovery(&self, id: SessionId, session: Arc<DiscoverySession>) -> Result<()> {
        match self.discoveries.entry(id) {
            Entry::Occupied(_) => Err(LampionError::DuplicateId {
                kind: SessionKind::Discovery,
                id,
            }),
            Entry::Vacant(entry) => {
                entry.insert(session);
                Ok(())
            }
        }
    }

    /// Looks a broadcast session up. Absence is not an error here; the
    /// operation layer decides how to surface unknown ids.
    pub fn broadcast(&self, id: SessionId) -> Option<Arc<BroadcastSession>> {
        self.broadcasts.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Looks a discovery session up.
    pub fn discovery(&self, id: SessionId) -> Option<Arc<DiscoverySession>> {
        self.discoveries.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Removes a broadcast id. No-op when absent.
    pub fn remove_broadcast(&self, id: SessionId) {
        if self.broadcasts.remove(&id).is_some() {
            debug!(id, "Broadcast session removed from registry");
        }
    }

    /// Removes a discovery id. No-op when absent.
    pub fn remove_discovery(&self, id: SessionId) {
        if self.discoveries.remove(&id).is_some() {
            debug!(id, "Discovery session removed from registry");
        }
    }

    /// Number of live sessions of each kind, (broadcasts, discoveries).
    pub fn counts(&self) -> (usize, usize) {
        (self.broadcasts.len(), self.discoveries.len())
    }

    /// Disposes every live session of both kinds.
    pub fn dispose_all(&self) {
        // Collect first: dispose re-enters the registry through the
        // completion callbacks, and removing while iterating a shard would
        // deadlock.
        let sessions: Vec<Arc<dyn Session>> = self
            .broadcasts
            .iter()
            .map(|entry| Arc::clone(entry.value()) as Arc<dyn Session>)
            .chain(
                self.discoveries
                    .iter()
                    .map(|entry| Arc::clone(entry.value()) as Arc<dyn Session>),
            )
            .collect();

        for session in sessions {
            session.dispose();
        }
    }
}
