//! LivePulse
//!
//! Real-time session activity pipeline: participants join and leave
//! sessions and send reactions, and the pipeline keeps live per-session
//! statistics and announces milestones the moment they are crossed.
//!
//! # Flow
//!
//! Events enter a bounded [`EventQueue`] (full means dropped, never
//! blocked). A [`WorkerPool`] pulls them concurrently and hands each to a
//! [`SessionEventHandler`], which updates the [`AggregationManager`] and
//! asks the [`MilestoneTracker`] whether any threshold was crossed.
//! Crossed milestones fire exactly once and are delivered to notifiers off
//! the worker's path.
//!
//! # Modules
//!
//! - `types`: events, milestones and stats snapshots
//! - `pipeline`: bounded queue, worker pool and the event handler
//! - `aggregation`: per-session concurrent counters
//! - `milestones`: threshold tracking and achievement notifiers
//! - `store`: JSONL event log, achievement log and session snapshots
//! - `api`: HTTP ingestion, read endpoints and the SSE live stream
//! - `config`: environment configuration
//! - `server`: wiring and serving
//!
//! # Example
//!
//! ```no_run
//! use live_pulse::{Config, Event, LivePulse, ReactionType};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::default();
//!     let mut pipeline = LivePulse::build(&config, None).unwrap();
//!     pipeline.start();
//!
//!     pipeline.queue().enqueue(Event::join("keynote", "alice"));
//!     pipeline.queue().enqueue(Event::reaction("keynote", "alice", ReactionType::Cheer));
//!
//!     pipeline.shutdown_with_drain().await;
//! }
//! ```

pub mod aggregation;
pub mod api;
pub mod config;
pub mod logging;
pub mod milestones;
pub mod pipeline;
pub mod server;
pub mod store;
pub mod types;

// Re-export commonly used items at crate root
pub use aggregation::{AggregationManager, SessionStats};
pub use config::{Config, ConfigError};
pub use milestones::{AchievementNotifier, FanoutNotifier, MilestoneTracker};
pub use pipeline::{EventHandler, EventQueue, PipelineError, SessionEventHandler, WorkerPool};
pub use server::LivePulse;
pub use store::{JsonlStore, StoreConfig, StoreError};
pub use types::{
    Event, EventType, LivePulseResult, Milestone, MilestoneAchievement, MilestoneType,
    ReactionType, StatsSnapshot,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
