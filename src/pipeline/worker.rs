//! Worker pool draining the event queue

use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::{EventHandler, EventQueue};
use crate::types::Event;

/// A fixed set of workers pulling from one shared queue
///
/// Workers check the cancellation token between events; an event that is
/// being handled always runs to completion.
pub struct WorkerPool {
    queue: Arc<EventQueue>,
    worker_count: usize,
    handler: Arc<dyn EventHandler>,
    cancel: CancellationToken,
    workers: JoinSet<()>,
}

impl WorkerPool {
    pub fn new(
        queue: Arc<EventQueue>,
        worker_count: NonZeroUsize,
        handler: Arc<dyn EventHandler>,
    ) -> Self {
        Self {
            queue,
            worker_count: worker_count.get(),
            handler,
            cancel: CancellationToken::new(),
            workers: JoinSet::new(),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// The queue this pool drains
    pub fn queue(&self) -> &Arc<EventQueue> {
        &self.queue
    }

    /// Launch all workers on the current tokio runtime
    pub fn start(&mut self) {
        info!(workers = self.worker_count, "starting worker pool");

        for id in 0..self.worker_count {
            let queue = Arc::clone(&self.queue);
            let handler = Arc::clone(&self.handler);
            let cancel = self.cancel.clone();
            self.workers.spawn(run_worker(id, queue, handler, cancel));
        }
    }

    /// Stop immediately, abandoning anything still queued
    pub async fn shutdown(mut self) {
        info!("shutting down worker pool");
        self.cancel.cancel();
        self.join_workers().await;
        info!(abandoned = self.queue.len(), "worker pool shutdown complete");
    }

    /// Close the queue, handle every buffered event on the calling task,
    /// then stop the workers
    ///
    /// Returns the number of drained events.
    pub async fn shutdown_with_drain(mut self) -> usize {
        info!("shutting down worker pool with drain");

        self.queue.close();
        let remaining = self.queue.drain().await;
        info!(count = remaining.len(), "processing remaining events");

        for event in &remaining {
            if let Err(e) = self.handler.handle(event) {
                error!(event_id = %event.id(), error = %e, "failed to process drained event");
            }
        }

        self.cancel.cancel();
        self.join_workers().await;
        info!("worker pool shutdown with drain complete");
        remaining.len()
    }

    async fn join_workers(&mut self) {
        while let Some(result) = self.workers.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "worker task failed");
            }
        }
    }
}

async fn run_worker(
    id: usize,
    queue: Arc<EventQueue>,
    handler: Arc<dyn EventHandler>,
    cancel: CancellationToken,
) {
    debug!(worker = id, "worker started");

    while !cancel.is_cancelled() {
        let Some(event) = queue.dequeue(&cancel).await else {
            debug!(worker = id, "queue closed or pool cancelled");
            break;
        };
        handle_isolated(id, handler.as_ref(), &event);
    }

    debug!(worker = id, "worker stopped");
}

/// Run the handler so that neither an error nor a panic escapes the worker
fn handle_isolated(worker: usize, handler: &dyn EventHandler, event: &Event) {
    match panic::catch_unwind(AssertUnwindSafe(|| handler.handle(event))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            error!(worker, event_id = %event.id(), session_id = %event.session_id(), error = %e, "failed to process event");
        }
        Err(_) => {
            error!(worker, event_id = %event.id(), session_id = %event.session_id(), "event handler panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counting_handler(counter: Arc<AtomicUsize>) -> Arc<dyn EventHandler> {
        Arc::new(move |_: &Event| -> Result<(), PipelineError> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn setup(capacity: usize, workers: usize, handler: Arc<dyn EventHandler>) -> (Arc<EventQueue>, WorkerPool) {
        let queue = Arc::new(EventQueue::new(NonZeroUsize::new(capacity).unwrap()));
        let pool = WorkerPool::new(Arc::clone(&queue), NonZeroUsize::new(workers).unwrap(), handler);
        (queue, pool)
    }

    async fn wait_for(counter: &AtomicUsize, expected: usize) {
        for _ in 0..200 {
            if counter.load(Ordering::SeqCst) >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn test_workers_process_events() {
        let counter = Arc::new(AtomicUsize::new(0));
        let (queue, mut pool) = setup(64, 4, counting_handler(Arc::clone(&counter)));
        pool.start();

        for i in 0..20 {
            assert!(queue.enqueue(Event::join("s1", format!("u{}", i))));
        }
        wait_for(&counter, 20).await;
        assert_eq!(counter.load(Ordering::SeqCst), 20);

        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_handler_errors_do_not_stop_workers() {
        let counter = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&counter);
        let handler: Arc<dyn EventHandler> = Arc::new(move |event: &Event| -> Result<(), PipelineError> {
            seen.fetch_add(1, Ordering::SeqCst);
            if event.user_id() == "bad" {
                return Err(PipelineError::Other("boom".to_string()));
            }
            if event.user_id() == "panic" {
                panic!("handler blew up");
            }
            Ok(())
        });
        let (queue, mut pool) = setup(16, 1, handler);
        pool.start();

        queue.enqueue(Event::join("s1", "bad"));
        queue.enqueue(Event::join("s1", "panic"));
        queue.enqueue(Event::join("s1", "good"));
        wait_for(&counter, 3).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);

        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_with_drain_processes_everything() {
        let counter = Arc::new(AtomicUsize::new(0));
        let (queue, mut pool) = setup(16, 4, counting_handler(Arc::clone(&counter)));
        pool.start();

        for i in 0..10 {
            assert!(queue.enqueue(Event::join("s1", format!("u{}", i))));
        }
        pool.shutdown_with_drain().await;

        assert_eq!(counter.load(Ordering::SeqCst), 10);
        assert!(queue.is_closed());
        assert!(!queue.enqueue(Event::join("s1", "late")));
    }

    #[tokio::test]
    async fn test_shutdown_with_drain_without_start() {
        let counter = Arc::new(AtomicUsize::new(0));
        let (queue, pool) = setup(16, 2, counting_handler(Arc::clone(&counter)));

        for i in 0..10 {
            queue.enqueue(Event::join("s1", format!("u{}", i)));
        }
        let drained = pool.shutdown_with_drain().await;

        assert_eq!(drained, 10);
        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn test_hard_shutdown_may_abandon_events() {
        let counter = Arc::new(AtomicUsize::new(0));
        let (queue, mut pool) = setup(16, 2, counting_handler(Arc::clone(&counter)));
        pool.start();

        for i in 0..10 {
            queue.enqueue(Event::join("s1", format!("u{}", i)));
        }
        pool.shutdown().await;

        let processed = counter.load(Ordering::SeqCst);
        assert!(processed <= 10);
        assert_eq!(processed + queue.len(), 10);
    }
}
