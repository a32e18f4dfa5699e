//! Point-in-time copies of session statistics

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ReactionType;

/// Immutable copy of one session's statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub session_id: String,
    pub active_user_count: usize,
    pub peak_concurrent_users: usize,
    pub total_reactions: u64,
    /// Reactions whose kind could not be attributed to a known bucket
    pub unattributed_reactions: u64,
    pub reaction_counts: BTreeMap<ReactionType, u64>,
    pub start_time: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub duration_seconds: f64,
}

impl StatsSnapshot {
    /// Whole minutes between session start and `now`
    pub fn elapsed_minutes(&self, now: DateTime<Utc>) -> u64 {
        (now - self.start_time).num_minutes().max(0) as u64
    }

    /// Sum of the per-kind counters
    pub fn attributed_reactions(&self) -> u64 {
        self.reaction_counts.values().sum()
    }
}
