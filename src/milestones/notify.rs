//! Achievement notification sinks

use std::sync::Arc;

use crate::types::MilestoneAchievement;

/// Receives achievements as they are detected
///
/// Called off the worker that detected the achievement; implementations may
/// block (e.g. on I/O) without stalling event processing.
pub trait AchievementNotifier: Send + Sync + 'static {
    fn notify(&self, achievement: &MilestoneAchievement);
}

impl<F> AchievementNotifier for F
where
    F: Fn(&MilestoneAchievement) + Send + Sync + 'static,
{
    fn notify(&self, achievement: &MilestoneAchievement) {
        self(achievement)
    }
}

/// Forwards each achievement to several sinks in order
pub struct FanoutNotifier {
    sinks: Vec<Arc<dyn AchievementNotifier>>,
}

impl FanoutNotifier {
    pub fn new(sinks: Vec<Arc<dyn AchievementNotifier>>) -> Self {
        Self { sinks }
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl AchievementNotifier for FanoutNotifier {
    fn notify(&self, achievement: &MilestoneAchievement) {
        for sink in &self.sinks {
            sink.notify(achievement);
        }
    }
}
