//! Live statistics for a single session
//!
//! Two protection tiers:
//! - membership, peak and last-activity live under one `RwLock`
//! - reaction counters are independent atomics so the reaction hot path
//!   never contends with join/leave bookkeeping
//!
//! The running total is bumped before the per-kind counter and read after
//! it, so a snapshot never shows more attributed reactions than the total.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::types::{ReactionType, StatsSnapshot};

struct Membership {
    active_users: HashSet<String>,
    peak_concurrent_users: usize,
    last_activity: DateTime<Utc>,
}

/// Concurrent counters for one session
pub struct SessionStats {
    session_id: String,
    start_time: DateTime<Utc>,
    membership: RwLock<Membership>,
    reaction_counts: [AtomicU64; ReactionType::ALL.len()],
    unattributed_reactions: AtomicU64,
    total_reactions: AtomicU64,
}

impl SessionStats {
    pub fn new(session_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            start_time: now,
            membership: RwLock::new(Membership {
                active_users: HashSet::new(),
                peak_concurrent_users: 0,
                last_activity: now,
            }),
            reaction_counts: Default::default(),
            unattributed_reactions: AtomicU64::new(0),
            total_reactions: AtomicU64::new(0),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// Mark a user active; returns the active-user count
    pub fn add_user(&self, user_id: &str) -> usize {
        let mut membership = self.membership.write();
        if !membership.active_users.contains(user_id) {
            membership.active_users.insert(user_id.to_string());
        }
        membership.last_activity = Utc::now();

        let current = membership.active_users.len();
        if current > membership.peak_concurrent_users {
            membership.peak_concurrent_users = current;
        }
        current
    }

    /// Mark a user inactive; returns the active-user count
    pub fn remove_user(&self, user_id: &str) -> usize {
        let mut membership = self.membership.write();
        membership.active_users.remove(user_id);
        membership.last_activity = Utc::now();
        membership.active_users.len()
    }

    /// Count one reaction; `None` counts toward the total only
    ///
    /// Returns the new total.
    pub fn increment_reaction(&self, kind: Option<ReactionType>) -> u64 {
        let total = self.total_reactions.fetch_add(1, Ordering::AcqRel) + 1;
        match kind {
            Some(kind) => self.reaction_counts[kind.index()].fetch_add(1, Ordering::AcqRel),
            None => self.unattributed_reactions.fetch_add(1, Ordering::AcqRel),
        };

        self.membership.write().last_activity = Utc::now();
        total
    }

    pub fn active_user_count(&self) -> usize {
        self.membership.read().active_users.len()
    }

    pub fn is_active(&self, user_id: &str) -> bool {
        self.membership.read().active_users.contains(user_id)
    }

    pub fn peak_concurrent_users(&self) -> usize {
        self.membership.read().peak_concurrent_users
    }

    pub fn total_reactions(&self) -> u64 {
        self.total_reactions.load(Ordering::Acquire)
    }

    pub fn unattributed_reactions(&self) -> u64 {
        self.unattributed_reactions.load(Ordering::Acquire)
    }

    pub fn reaction_count(&self, kind: ReactionType) -> u64 {
        self.reaction_counts[kind.index()].load(Ordering::Acquire)
    }

    /// Counts for every known kind, including zeros
    pub fn all_reaction_counts(&self) -> BTreeMap<ReactionType, u64> {
        ReactionType::ALL
            .into_iter()
            .map(|kind| (kind, self.reaction_count(kind)))
            .collect()
    }

    /// Consistent point-in-time copy
    pub fn snapshot(&self) -> StatsSnapshot {
        let membership = self.membership.read();
        let reaction_counts = self.all_reaction_counts();
        let unattributed_reactions = self.unattributed_reactions();
        let total_reactions = self.total_reactions();
        let now = Utc::now();

        StatsSnapshot {
            session_id: self.session_id.clone(),
            active_user_count: membership.active_users.len(),
            peak_concurrent_users: membership.peak_concurrent_users,
            total_reactions,
            unattributed_reactions,
            reaction_counts,
            start_time: self.start_time,
            last_activity: membership.last_activity,
            duration_seconds: (now - self.start_time).num_milliseconds() as f64 / 1000.0,
        }
    }
}
