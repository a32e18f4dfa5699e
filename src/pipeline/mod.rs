//! Event-processing pipeline
//!
//! ```text
//! producer ──► EventQueue ──► WorkerPool (N workers) ──► EventHandler
//!   (drop on full)   (bounded FIFO)   (cancellable)      aggregation ─► milestones ─► notifier
//! ```
//!
//! - `EventQueue`: bounded buffer, non-blocking enqueue, cancellable dequeue
//! - `WorkerPool`: fixed workers with hard and draining shutdown
//! - `SessionEventHandler`: the canonical handler wiring both engines

mod handler;
mod queue;
mod worker;

pub use handler::{EventHandler, SessionEventHandler};
pub use queue::EventQueue;
pub use worker::WorkerPool;

use thiserror::Error;

use crate::store::StoreError;

/// Failure to process a single event
///
/// These never stop a worker; they are logged and the event is skipped.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("event {0} has no session id")]
    MissingSessionId(String),

    #[error("event {0} has no user id")]
    MissingUserId(String),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("{0}")]
    Other(String),
}
