//! Live update broadcaster
//!
//! Fans out milestone achievements and session lifecycle changes to every
//! connected stream client. Having no subscribers is not an error; slow
//! subscribers lag and are told how many updates they missed.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::milestones::AchievementNotifier;
use crate::types::{MilestoneAchievement, StatsSnapshot};

/// Updates pushed to live clients
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveEvent {
    MilestoneAchieved { achievement: MilestoneAchievement },
    SessionEnded { snapshot: StatsSnapshot },
}

/// Live update wrapper with metadata
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LiveUpdate {
    #[serde(flatten)]
    pub event: LiveEvent,

    /// Monotonically increasing sequence ID for gap detection
    pub sequence_id: u64,

    /// Unix timestamp when the update was created
    pub timestamp: i64,
}

pub struct Broadcaster {
    tx: broadcast::Sender<LiveUpdate>,
    sequence_counter: AtomicU64,
}

impl Broadcaster {
    /// Create a broadcaster buffering up to `capacity` updates per client
    pub fn new(capacity: NonZeroUsize) -> Self {
        let (tx, _) = broadcast::channel(capacity.get());
        Self {
            tx,
            sequence_counter: AtomicU64::new(0),
        }
    }

    pub fn broadcast(&self, event: LiveEvent) {
        let seq = self.sequence_counter.fetch_add(1, Ordering::SeqCst);
        let update = LiveUpdate {
            event,
            sequence_id: seq,
            timestamp: chrono::Utc::now().timestamp(),
        };
        // No receivers connected
        let _ = self.tx.send(update);
    }

    pub fn current_sequence_id(&self) -> u64 {
        self.sequence_counter.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LiveUpdate> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl AchievementNotifier for Broadcaster {
    fn notify(&self, achievement: &MilestoneAchievement) {
        self.broadcast(LiveEvent::MilestoneAchieved {
            achievement: achievement.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Milestone, MilestoneType};
    use chrono::Utc;

    fn broadcaster() -> Broadcaster {
        Broadcaster::new(NonZeroUsize::new(16).unwrap())
    }

    fn achievement() -> MilestoneAchievement {
        MilestoneAchievement {
            milestone: Milestone::new("s1", MilestoneType::TotalReactions, 100),
            session_id: "s1".to_string(),
            achieved_at: Utc::now(),
            current_value: 100,
        }
    }

    #[test]
    fn test_broadcast_without_subscribers() {
        let broadcaster = broadcaster();
        assert_eq!(broadcaster.subscriber_count(), 0);
        broadcaster.notify(&achievement());
        assert_eq!(broadcaster.current_sequence_id(), 1);
    }

    #[tokio::test]
    async fn test_subscriber_receives_achievement() {
        let broadcaster = broadcaster();
        let mut rx = broadcaster.subscribe();

        broadcaster.notify(&achievement());

        let update = rx.recv().await.unwrap();
        assert_eq!(update.sequence_id, 0);
        assert!(matches!(
            update.event,
            LiveEvent::MilestoneAchieved { ref achievement } if achievement.current_value == 100
        ));

        let json = serde_json::to_string(&update).unwrap();
        assert!(json.contains("\"type\":\"milestone_achieved\""));
    }
}
