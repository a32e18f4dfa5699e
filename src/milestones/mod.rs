//! Milestone tracking
//!
//! Each session owns an ordered list of [`Milestone`]s guarded by its own
//! lock; the registry lock is only held to look a session up. The tracker
//! reads session statistics exclusively through [`StatsSnapshot`]s.

mod notify;

pub use notify::{AchievementNotifier, FanoutNotifier};

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};

use crate::types::{Milestone, MilestoneAchievement, MilestoneType, StatsSnapshot};

type SessionMilestones = Arc<Mutex<Vec<Milestone>>>;

/// Tracks milestone progress for every session
pub struct MilestoneTracker {
    sessions: RwLock<HashMap<String, SessionMilestones>>,
    notifier: Option<Arc<dyn AchievementNotifier>>,
}

impl MilestoneTracker {
    /// Tracker without a notification sink
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            notifier: None,
        }
    }

    pub fn with_notifier(notifier: Arc<dyn AchievementNotifier>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            notifier: Some(notifier),
        }
    }

    /// Replace the session's milestones with one `total_reactions` goal per
    /// threshold
    ///
    /// Duplicate thresholds collapse into a single milestone. Returns the
    /// number of milestones created.
    pub fn initialize_session(&self, session_id: &str, thresholds: &[u64]) -> usize {
        let milestones = build_milestones(session_id, thresholds);
        let count = milestones.len();

        self.sessions
            .write()
            .insert(session_id.to_string(), Arc::new(Mutex::new(milestones)));

        info!(session_id, count, "initialized milestones");
        count
    }

    /// Initialize the session only if it has no milestones yet
    ///
    /// Returns `true` when this call created the set.
    pub fn ensure_session(&self, session_id: &str, thresholds: &[u64]) -> bool {
        if self.sessions.read().contains_key(session_id) {
            return false;
        }

        let mut sessions = self.sessions.write();
        if sessions.contains_key(session_id) {
            return false;
        }
        let milestones = build_milestones(session_id, thresholds);
        info!(session_id, count = milestones.len(), "seeded milestones");
        sessions.insert(session_id.to_string(), Arc::new(Mutex::new(milestones)));
        true
    }

    pub fn has_session(&self, session_id: &str) -> bool {
        self.sessions.read().contains_key(session_id)
    }

    /// Evaluate every pending milestone of the session against `stats`
    ///
    /// Each freshly achieved milestone is dispatched to the notifier without
    /// waiting for it, and returned.
    pub fn check_milestones(
        &self,
        session_id: &str,
        stats: &StatsSnapshot,
    ) -> Vec<MilestoneAchievement> {
        let Some(milestones) = self.session(session_id) else {
            return Vec::new();
        };

        let now = Utc::now();
        let mut achievements = Vec::new();
        {
            let mut milestones = milestones.lock();
            for milestone in milestones.iter_mut().filter(|m| !m.is_achieved()) {
                let current_value = match milestone.milestone_type() {
                    MilestoneType::TotalReactions => stats.total_reactions,
                    MilestoneType::ConcurrentUsers => stats.active_user_count as u64,
                    MilestoneType::SessionDuration => stats.elapsed_minutes(now),
                };

                if milestone.update_progress(current_value) {
                    info!(
                        session_id,
                        milestone_type = %milestone.milestone_type(),
                        threshold = milestone.threshold(),
                        current_value,
                        "milestone achieved"
                    );
                    achievements.push(MilestoneAchievement {
                        milestone: milestone.clone(),
                        session_id: session_id.to_string(),
                        achieved_at: milestone.achieved_at().unwrap_or(now),
                        current_value,
                    });
                }
            }
        }

        for achievement in &achievements {
            self.dispatch(achievement.clone());
        }
        achievements
    }

    /// Copies of every milestone for the session, in order
    pub fn session_milestones(&self, session_id: &str) -> Option<Vec<Milestone>> {
        self.session(session_id)
            .map(|milestones| milestones.lock().clone())
    }

    /// Copies of the session's achieved milestones
    pub fn achieved_milestones(&self, session_id: &str) -> Vec<Milestone> {
        self.session(session_id)
            .map(|milestones| {
                milestones
                    .lock()
                    .iter()
                    .filter(|m| m.is_achieved())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Stop tracking a session; returns whether it was tracked
    pub fn remove_session(&self, session_id: &str) -> bool {
        self.sessions.write().remove(session_id).is_some()
    }

    /// Append a milestone of any type to the session
    ///
    /// Returns `false` when a milestone with the same type and threshold
    /// already exists.
    pub fn add_custom_milestone(
        &self,
        session_id: &str,
        milestone_type: MilestoneType,
        threshold: u64,
    ) -> bool {
        let milestones = {
            let mut sessions = self.sessions.write();
            Arc::clone(sessions.entry(session_id.to_string()).or_default())
        };

        let milestone = Milestone::new(session_id, milestone_type, threshold);
        let mut milestones = milestones.lock();
        if milestones.iter().any(|m| m.id() == milestone.id()) {
            return false;
        }
        milestones.push(milestone);
        true
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    fn session(&self, session_id: &str) -> Option<SessionMilestones> {
        self.sessions.read().get(session_id).cloned()
    }

    /// Hand the achievement to the notifier without blocking the caller
    fn dispatch(&self, achievement: MilestoneAchievement) {
        let Some(notifier) = self.notifier.clone() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn_blocking(move || notifier.notify(&achievement));
            }
            Err(_) => {
                let spawned = std::thread::Builder::new()
                    .name("milestone-notify".to_string())
                    .spawn(move || notifier.notify(&achievement));
                if let Err(e) = spawned {
                    warn!(error = %e, "failed to spawn notification thread");
                }
            }
        }
    }
}

impl Default for MilestoneTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn build_milestones(session_id: &str, thresholds: &[u64]) -> Vec<Milestone> {
    let mut milestones: Vec<Milestone> = Vec::with_capacity(thresholds.len());
    for &threshold in thresholds {
        let milestone = Milestone::new(session_id, MilestoneType::TotalReactions, threshold);
        if !milestones.iter().any(|m| m.id() == milestone.id()) {
            milestones.push(milestone);
        }
    }
    milestones
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::collections::BTreeMap;
    use std::sync::mpsc;

    fn stats(total_reactions: u64, active_user_count: usize) -> StatsSnapshot {
        let now = Utc::now();
        StatsSnapshot {
            session_id: "s1".to_string(),
            active_user_count,
            peak_concurrent_users: active_user_count,
            total_reactions,
            unattributed_reactions: 0,
            reaction_counts: BTreeMap::new(),
            start_time: now,
            last_activity: now,
            duration_seconds: 0.0,
        }
    }

    #[test]
    fn test_initialize_session_replaces_set() {
        let tracker = MilestoneTracker::new();
        assert_eq!(tracker.initialize_session("s1", &[100, 500, 100]), 2);
        assert_eq!(tracker.initialize_session("s1", &[10]), 1);

        let milestones = tracker.session_milestones("s1").unwrap();
        assert_eq!(milestones.len(), 1);
        assert_eq!(milestones[0].threshold(), 10);
    }

    #[test]
    fn test_check_fires_once_per_threshold() {
        let tracker = MilestoneTracker::new();
        tracker.initialize_session("s1", &[100, 500]);

        assert!(tracker.check_milestones("s1", &stats(99, 0)).is_empty());

        let fired = tracker.check_milestones("s1", &stats(150, 0));
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].milestone.threshold(), 100);
        assert_eq!(fired[0].current_value, 150);

        assert!(tracker.check_milestones("s1", &stats(200, 0)).is_empty());
        // Out-of-order lower reading is a no-op
        assert!(tracker.check_milestones("s1", &stats(120, 0)).is_empty());

        let fired = tracker.check_milestones("s1", &stats(600, 0));
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].milestone.threshold(), 500);
        assert_eq!(tracker.achieved_milestones("s1").len(), 2);
    }

    #[test]
    fn test_concurrent_users_milestone_does_not_revert() {
        let tracker = MilestoneTracker::new();
        assert!(tracker.add_custom_milestone("s1", MilestoneType::ConcurrentUsers, 3));

        assert_eq!(tracker.check_milestones("s1", &stats(0, 3)).len(), 1);
        assert!(tracker.check_milestones("s1", &stats(0, 1)).is_empty());
        assert!(tracker.check_milestones("s1", &stats(0, 4)).is_empty());

        let milestones = tracker.session_milestones("s1").unwrap();
        assert!(milestones[0].is_achieved());
    }

    #[test]
    fn test_session_duration_is_pulled_at_check_time() {
        let tracker = MilestoneTracker::new();
        tracker.add_custom_milestone("s1", MilestoneType::SessionDuration, 5);

        let mut snapshot = stats(0, 0);
        assert!(tracker.check_milestones("s1", &snapshot).is_empty());

        snapshot.start_time = Utc::now() - Duration::minutes(6);
        let fired = tracker.check_milestones("s1", &snapshot);
        assert_eq!(fired.len(), 1);
        assert!(fired[0].current_value >= 5);
    }

    #[test]
    fn test_add_custom_milestone_is_idempotent() {
        let tracker = MilestoneTracker::new();
        tracker.initialize_session("s1", &[100]);
        assert!(!tracker.add_custom_milestone("s1", MilestoneType::TotalReactions, 100));
        assert!(tracker.add_custom_milestone("s1", MilestoneType::ConcurrentUsers, 100));
        assert_eq!(tracker.session_milestones("s1").unwrap().len(), 2);
    }

    #[test]
    fn test_returned_milestones_are_copies() {
        let tracker = MilestoneTracker::new();
        tracker.initialize_session("s1", &[1]);

        let mut copy = tracker.session_milestones("s1").unwrap();
        copy[0].update_progress(10);
        copy.clear();

        let owned = tracker.session_milestones("s1").unwrap();
        assert_eq!(owned.len(), 1);
        assert!(!owned[0].is_achieved());
    }

    #[test]
    fn test_ensure_session_only_seeds_once() {
        let tracker = MilestoneTracker::new();
        assert!(tracker.ensure_session("s1", &[1, 2]));
        assert!(!tracker.ensure_session("s1", &[3]));
        assert_eq!(tracker.session_milestones("s1").unwrap().len(), 2);
    }

    #[test]
    fn test_unknown_session() {
        let tracker = MilestoneTracker::new();
        assert!(tracker.check_milestones("nope", &stats(10, 0)).is_empty());
        assert!(tracker.session_milestones("nope").is_none());
        assert!(tracker.achieved_milestones("nope").is_empty());
        assert!(!tracker.remove_session("nope"));
    }

    #[test]
    fn test_notifier_invoked_off_thread() {
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let tracker = MilestoneTracker::with_notifier(Arc::new(move |a: &MilestoneAchievement| {
            let _ = tx.lock().send((a.clone(), std::thread::current().id()));
        }));
        tracker.initialize_session("s1", &[1]);

        tracker.check_milestones("s1", &stats(1, 0));
        let (achievement, thread) = rx.recv_timeout(std::time::Duration::from_secs(2)).unwrap();
        assert_eq!(achievement.milestone.id(), "s1_total_reactions_1");
        assert_ne!(thread, std::thread::current().id());

        tracker.check_milestones("s1", &stats(5, 0));
        assert!(rx.recv_timeout(std::time::Duration::from_millis(100)).is_err());
    }
}
