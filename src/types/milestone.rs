//! Milestone goals and achievement records

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The session metric a milestone is measured against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneType {
    /// Total reactions received in the session
    TotalReactions,
    /// Users active at the same time
    ConcurrentUsers,
    /// Whole minutes elapsed since the session started
    SessionDuration,
}

impl fmt::Display for MilestoneType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MilestoneType::TotalReactions => write!(f, "total_reactions"),
            MilestoneType::ConcurrentUsers => write!(f, "concurrent_users"),
            MilestoneType::SessionDuration => write!(f, "session_duration"),
        }
    }
}

/// A one-shot threshold goal over a session metric
///
/// State only moves forward: once `achieved` is set it stays set, whatever
/// progress is reported afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    id: String,
    session_id: String,
    #[serde(rename = "type")]
    milestone_type: MilestoneType,
    threshold: u64,
    progress: u64,
    achieved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    achieved_at: Option<DateTime<Utc>>,
    description: String,
}

impl Milestone {
    /// Create a pending milestone
    pub fn new(session_id: &str, milestone_type: MilestoneType, threshold: u64) -> Self {
        Self {
            id: Self::make_id(session_id, milestone_type, threshold),
            session_id: session_id.to_string(),
            milestone_type,
            threshold,
            progress: 0,
            achieved: false,
            achieved_at: None,
            description: describe(milestone_type, threshold),
        }
    }

    /// Deterministic id for `(session, type, threshold)`
    pub fn make_id(session_id: &str, milestone_type: MilestoneType, threshold: u64) -> String {
        format!("{}_{}_{}", session_id, milestone_type, threshold)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn milestone_type(&self) -> MilestoneType {
        self.milestone_type
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    pub fn progress(&self) -> u64 {
        self.progress
    }

    pub fn is_achieved(&self) -> bool {
        self.achieved
    }

    pub fn achieved_at(&self) -> Option<DateTime<Utc>> {
        self.achieved_at
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Record the latest metric value
    ///
    /// Returns `true` only on the call that first reaches the threshold.
    pub fn update_progress(&mut self, value: u64) -> bool {
        self.progress = value;

        if !self.achieved && value >= self.threshold {
            self.achieved = true;
            self.achieved_at = Some(Utc::now());
            return true;
        }

        false
    }

    /// Progress as a percentage of the threshold, clamped to `[0, 100]`
    pub fn progress_percentage(&self) -> f64 {
        if self.threshold == 0 {
            return 0.0;
        }
        let percentage = self.progress as f64 / self.threshold as f64 * 100.0;
        percentage.clamp(0.0, 100.0)
    }
}

fn describe(milestone_type: MilestoneType, threshold: u64) -> String {
    match milestone_type {
        MilestoneType::TotalReactions => format!("{} total reactions", threshold),
        MilestoneType::ConcurrentUsers => format!("{} concurrent users", threshold),
        MilestoneType::SessionDuration => format!("{} minutes session duration", threshold),
    }
}

/// The fact that a milestone's threshold was first crossed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestoneAchievement {
    /// Milestone state at the moment it was achieved
    pub milestone: Milestone,
    pub session_id: String,
    pub achieved_at: DateTime<Utc>,
    /// Metric value that crossed the threshold
    pub current_value: u64,
}
