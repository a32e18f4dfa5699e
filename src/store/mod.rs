//! Persistence adapter
//!
//! A file-backed stand-in for the downstream store: accepted events and
//! achievements go to append-only JSONL logs, finished sessions are written
//! as one snapshot file each.
//!
//! ```text
//! data/
//! ├── events.jsonl       (optional, one Event per line)
//! ├── milestones.jsonl   (one MilestoneAchievement per line, fsynced)
//! └── sessions/
//!     └── <session>.json (final StatsSnapshot, atomic replace)
//! ```

mod atomic;
mod store;

pub use atomic::{atomic_write, cleanup_temp_files};
pub use store::{JsonlStore, StoreConfig, StoreError, StoreResult};
