//! Data types for the LivePulse pipeline
//!
//! This module contains the plain value records shared between the queue,
//! the aggregation engine, the milestone tracker and downstream consumers.

mod event;
mod milestone;
mod snapshot;

pub use event::{Event, EventType, ReactionType, UnknownReactionType, REACTION_TYPE_KEY};
pub use milestone::{Milestone, MilestoneAchievement, MilestoneType};
pub use snapshot::StatsSnapshot;

/// Result type for the binary and other top-level plumbing
pub type LivePulseResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;
