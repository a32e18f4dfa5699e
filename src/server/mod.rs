//! Pipeline assembly and HTTP serving
//!
//! [`LivePulse`] wires the queue, workers, aggregation, milestone tracking
//! and notification sinks together from a [`Config`]. [`serve`] exposes the
//! assembled pipeline over HTTP until a shutdown signal arrives, then drains
//! whatever is still queued.

use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::timeout::TimeoutLayer;
use tracing::info;

use crate::aggregation::AggregationManager;
use crate::api::{create_router, AppState, Broadcaster};
use crate::config::{Config, ConfigError};
use crate::milestones::{AchievementNotifier, FanoutNotifier, MilestoneTracker};
use crate::pipeline::{EventQueue, SessionEventHandler, WorkerPool};
use crate::store::JsonlStore;
use crate::types::LivePulseResult;

/// A fully wired event pipeline
pub struct LivePulse {
    queue: Arc<EventQueue>,
    aggregation: Arc<AggregationManager>,
    milestones: Arc<MilestoneTracker>,
    broadcaster: Arc<Broadcaster>,
    store: Option<Arc<JsonlStore>>,
    pool: WorkerPool,
    default_thresholds: Vec<u64>,
    closing: CancellationToken,
}

impl LivePulse {
    /// Build every component; nothing runs until [`start`](Self::start)
    ///
    /// With a store, processed events are appended to the event log and
    /// achievements are persisted alongside the live broadcast.
    pub fn build(config: &Config, store: Option<Arc<JsonlStore>>) -> Result<Self, ConfigError> {
        let queue_capacity = config.worker.queue_capacity()?;
        let worker_count = config.worker.worker_count()?;
        let broadcast_capacity = NonZeroUsize::new(config.broadcast_capacity)
            .ok_or(ConfigError::InvalidBroadcastCapacity)?;
        config.server.request_timeout()?;

        let queue = Arc::new(EventQueue::new(queue_capacity));
        let aggregation = Arc::new(AggregationManager::new());
        let broadcaster = Arc::new(Broadcaster::new(broadcast_capacity));

        let mut sinks: Vec<Arc<dyn AchievementNotifier>> = vec![broadcaster.clone() as Arc<dyn AchievementNotifier>];
        if let Some(store) = &store {
            sinks.push(store.clone());
        }
        let milestones = Arc::new(MilestoneTracker::with_notifier(Arc::new(
            FanoutNotifier::new(sinks),
        )));

        let default_thresholds = config.milestone.thresholds.clone();
        let mut handler = SessionEventHandler::new(Arc::clone(&aggregation), Arc::clone(&milestones))
            .with_seed_thresholds(default_thresholds.clone());
        if let Some(store) = &store {
            handler = handler.with_event_log(Arc::clone(store));
        }

        let pool = WorkerPool::new(Arc::clone(&queue), worker_count, Arc::new(handler));

        Ok(Self {
            queue,
            aggregation,
            milestones,
            broadcaster,
            store,
            pool,
            default_thresholds,
            closing: CancellationToken::new(),
        })
    }

    /// Spawn the workers. Requires a tokio runtime.
    pub fn start(&mut self) {
        self.pool.start();
    }

    pub fn queue(&self) -> &Arc<EventQueue> {
        &self.queue
    }

    pub fn aggregation(&self) -> &Arc<AggregationManager> {
        &self.aggregation
    }

    pub fn milestones(&self) -> &Arc<MilestoneTracker> {
        &self.milestones
    }

    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    /// Shared state for the HTTP handlers
    pub fn app_state(&self) -> Arc<AppState> {
        Arc::new(AppState {
            queue: Arc::clone(&self.queue),
            aggregation: Arc::clone(&self.aggregation),
            milestones: Arc::clone(&self.milestones),
            broadcaster: Arc::clone(&self.broadcaster),
            store: self.store.clone(),
            default_thresholds: self.default_thresholds.clone(),
            shutdown: self.closing.clone(),
        })
    }

    /// Stop the workers without processing what is still queued
    pub async fn shutdown(self) {
        self.closing.cancel();
        self.pool.shutdown().await;
    }

    /// Stop accepting events, process everything queued, then stop.
    /// Returns how many events the drain handled.
    pub async fn shutdown_with_drain(self) -> usize {
        self.closing.cancel();
        self.pool.shutdown_with_drain().await
    }
}

/// Serve the HTTP API until ctrl-c (or SIGTERM), then drain the pipeline
pub async fn serve(mut pipeline: LivePulse, config: &Config) -> LivePulseResult<()> {
    let request_timeout = config.server.request_timeout()?;
    pipeline.start();

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "listening");

    let router = create_router(pipeline.app_state()).layer(TimeoutLayer::new(request_timeout));

    let streams = pipeline.closing.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("shutdown signal received");
            streams.cancel();
        })
        .await?;

    let drained = pipeline.shutdown_with_drain().await;
    info!(drained, "pipeline stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Event, ReactionType};
    use std::time::Duration;
    use tempfile::TempDir;

    fn small_config() -> Config {
        let mut config = Config::default();
        config.worker.count = 2;
        config.worker.event_queue_size = 64;
        config.milestone.thresholds = vec![3];
        config
    }

    #[test]
    fn test_build_rejects_zero_broadcast_capacity() {
        let mut config = small_config();
        config.broadcast_capacity = 0;
        assert!(matches!(
            LivePulse::build(&config, None),
            Err(ConfigError::InvalidBroadcastCapacity)
        ));
    }

    #[test]
    fn test_build_rejects_overflowing_timeouts() {
        let mut config = small_config();
        config.server.read_timeout = Duration::MAX;
        assert!(matches!(
            LivePulse::build(&config, None),
            Err(ConfigError::InvalidTimeout)
        ));
    }

    #[tokio::test]
    async fn test_events_flow_to_stats_and_subscribers() {
        let mut pipeline = LivePulse::build(&small_config(), None).unwrap();
        let mut updates = pipeline.broadcaster().subscribe();
        pipeline.start();

        for i in 0..3 {
            assert!(pipeline
                .queue()
                .enqueue(Event::reaction("s1", format!("u{}", i), ReactionType::Like)));
        }

        let update = tokio::time::timeout(Duration::from_secs(5), updates.recv())
            .await
            .expect("achievement broadcast")
            .unwrap();
        assert_eq!(update.sequence_id, 0);

        let aggregation = Arc::clone(pipeline.aggregation());
        pipeline.shutdown_with_drain().await;
        assert_eq!(aggregation.snapshot("s1").unwrap().total_reactions, 3);
    }

    #[tokio::test]
    async fn test_store_receives_events_and_achievements() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(
            JsonlStore::open(crate::store::StoreConfig::new(dir.path())).unwrap(),
        );

        let mut pipeline = LivePulse::build(&small_config(), Some(Arc::clone(&store))).unwrap();
        let mut updates = pipeline.broadcaster().subscribe();
        pipeline.start();
        for i in 0..3 {
            pipeline
                .queue()
                .enqueue(Event::reaction("s1", format!("u{}", i), ReactionType::Fire));
        }
        tokio::time::timeout(Duration::from_secs(5), updates.recv())
            .await
            .expect("achievement broadcast")
            .unwrap();
        pipeline.shutdown_with_drain().await;

        assert_eq!(store.read_events().unwrap().len(), 3);

        // the store sink runs on its own blocking task
        let mut persisted = Vec::new();
        for _ in 0..50 {
            persisted = store.read_achievements().unwrap();
            if !persisted.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].current_value, 3);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_app_state_token() {
        let pipeline = LivePulse::build(&small_config(), None).unwrap();
        let state = pipeline.app_state();
        assert!(!state.shutdown.is_cancelled());
        pipeline.shutdown().await;
        assert!(state.shutdown.is_cancelled());
    }
}
