//! Aggregation engine
//!
//! Registry of per-session [`SessionStats`], created lazily on the first
//! event for a session and exactly once per session id.

mod session;

pub use session::SessionStats;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::types::{Event, EventType, StatsSnapshot};

/// Owns the statistics of every live session
pub struct AggregationManager {
    sessions: RwLock<HashMap<String, Arc<SessionStats>>>,
}

impl AggregationManager {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Return the session's stats, creating them on first access
    ///
    /// Concurrent first accesses for the same id all receive the same
    /// instance.
    pub fn get_or_create_session(&self, session_id: &str) -> Arc<SessionStats> {
        if let Some(stats) = self.sessions.read().get(session_id) {
            return Arc::clone(stats);
        }

        let mut sessions = self.sessions.write();
        // Re-check: another writer may have won the race
        if let Some(stats) = sessions.get(session_id) {
            return Arc::clone(stats);
        }

        debug!(session_id, "creating session stats");
        let stats = Arc::new(SessionStats::new(session_id));
        sessions.insert(session_id.to_string(), Arc::clone(&stats));
        stats
    }

    pub fn get_session(&self, session_id: &str) -> Option<Arc<SessionStats>> {
        self.sessions.read().get(session_id).cloned()
    }

    /// Apply an event to its session's counters
    ///
    /// Returns the stats that were updated.
    pub fn process_event(&self, event: &Event) -> Arc<SessionStats> {
        let stats = self.get_or_create_session(event.session_id());

        match event.event_type() {
            EventType::JoinSession => {
                stats.add_user(event.user_id());
            }
            EventType::LeaveSession => {
                stats.remove_user(event.user_id());
            }
            EventType::Reaction => {
                let kind = event.reaction_type();
                if kind.is_none() {
                    debug!(event_id = %event.id(), "reaction without a known kind");
                }
                stats.increment_reaction(kind);
            }
        }

        stats
    }

    pub fn snapshot(&self, session_id: &str) -> Option<StatsSnapshot> {
        self.get_session(session_id).map(|stats| stats.snapshot())
    }

    /// Snapshots of every tracked session
    pub fn all_snapshots(&self) -> HashMap<String, StatsSnapshot> {
        let sessions: Vec<Arc<SessionStats>> = self.sessions.read().values().cloned().collect();
        sessions
            .into_iter()
            .map(|stats| (stats.session_id().to_string(), stats.snapshot()))
            .collect()
    }

    /// Stop tracking a session, returning its final snapshot
    pub fn remove_session(&self, session_id: &str) -> Option<StatsSnapshot> {
        let removed = self.sessions.write().remove(session_id);
        removed.map(|stats| stats.snapshot())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }
}

impl Default for AggregationManager {
    fn default() -> Self {
        Self::new()
    }
}
