//! Shared application state for HTTP handlers

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::broadcaster::Broadcaster;
use crate::aggregation::AggregationManager;
use crate::milestones::MilestoneTracker;
use crate::pipeline::EventQueue;
use crate::store::JsonlStore;

pub struct AppState {
    /// Producer side of the pipeline
    pub queue: Arc<EventQueue>,

    /// Read side: live session statistics
    pub aggregation: Arc<AggregationManager>,

    pub milestones: Arc<MilestoneTracker>,

    pub broadcaster: Arc<Broadcaster>,

    /// Receives final snapshots of ended sessions
    pub store: Option<Arc<JsonlStore>>,

    /// Thresholds used when a session is started without explicit ones
    pub default_thresholds: Vec<u64>,

    /// Cancelled when the server begins shutting down; ends open streams
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn current_sequence_id(&self) -> u64 {
        self.broadcaster.current_sequence_id()
    }
}
