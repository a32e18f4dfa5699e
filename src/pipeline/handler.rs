//! Event handlers invoked by the worker pool

use std::sync::Arc;

use super::PipelineError;
use crate::aggregation::AggregationManager;
use crate::milestones::MilestoneTracker;
use crate::store::JsonlStore;
use crate::types::Event;

/// Processes a single event pulled from the queue
///
/// Implementations must tolerate concurrent calls for the same session in
/// any order.
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &Event) -> Result<(), PipelineError>;
}

impl<F> EventHandler for F
where
    F: Fn(&Event) -> Result<(), PipelineError> + Send + Sync,
{
    fn handle(&self, event: &Event) -> Result<(), PipelineError> {
        self(event)
    }
}

/// Aggregates an event, then evaluates milestones against the updated stats
pub struct SessionEventHandler {
    aggregation: Arc<AggregationManager>,
    milestones: Arc<MilestoneTracker>,
    /// Thresholds used to seed milestones for sessions seen for the first time
    seed_thresholds: Vec<u64>,
    event_log: Option<Arc<JsonlStore>>,
}

impl SessionEventHandler {
    pub fn new(aggregation: Arc<AggregationManager>, milestones: Arc<MilestoneTracker>) -> Self {
        Self {
            aggregation,
            milestones,
            seed_thresholds: Vec::new(),
            event_log: None,
        }
    }

    /// Seed new sessions with `total_reactions` milestones at these thresholds
    pub fn with_seed_thresholds(mut self, thresholds: Vec<u64>) -> Self {
        self.seed_thresholds = thresholds;
        self
    }

    /// Append every processed event to the store's event log
    pub fn with_event_log(mut self, store: Arc<JsonlStore>) -> Self {
        self.event_log = Some(store);
        self
    }
}

impl EventHandler for SessionEventHandler {
    fn handle(&self, event: &Event) -> Result<(), PipelineError> {
        if event.session_id().is_empty() {
            return Err(PipelineError::MissingSessionId(event.id().to_string()));
        }
        if event.user_id().is_empty() {
            return Err(PipelineError::MissingUserId(event.id().to_string()));
        }

        if !self.seed_thresholds.is_empty() {
            self.milestones
                .ensure_session(event.session_id(), &self.seed_thresholds);
        }

        let stats = self.aggregation.process_event(event);
        self.milestones
            .check_milestones(event.session_id(), &stats.snapshot());

        if let Some(store) = &self.event_log {
            store.append_event(event)?;
        }
        Ok(())
    }
}
