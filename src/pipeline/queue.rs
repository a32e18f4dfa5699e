//! Bounded event queue between producers and the worker pool
//!
//! Producers never block: a full or closed queue drops the event and
//! returns `false`. Consumers block on [`EventQueue::dequeue`] until an
//! event arrives, the queue is closed and exhausted, or the pool is
//! cancelled.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::RwLock;
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::types::Event;

/// Bounded FIFO buffer of pending events
pub struct EventQueue {
    /// `None` once the queue is closed; dropping the sender closes the channel
    sender: RwLock<Option<mpsc::Sender<Event>>>,
    receiver: Mutex<mpsc::Receiver<Event>>,
    capacity: usize,
    /// Approximate number of buffered events
    buffered: AtomicUsize,
    drained: AtomicBool,
}

impl EventQueue {
    /// Create a queue holding at most `capacity` events
    pub fn new(capacity: NonZeroUsize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.get());
        Self {
            sender: RwLock::new(Some(sender)),
            receiver: Mutex::new(receiver),
            capacity: capacity.get(),
            buffered: AtomicUsize::new(0),
            drained: AtomicBool::new(false),
        }
    }

    /// Add an event without blocking
    ///
    /// Returns `false` when the event was dropped because the queue is full
    /// or closed.
    pub fn enqueue(&self, event: Event) -> bool {
        let sender = self.sender.read();
        let Some(tx) = sender.as_ref() else {
            warn!(event_id = %event.id(), session_id = %event.session_id(), "event queue closed, dropping event");
            return false;
        };

        self.buffered.fetch_add(1, Ordering::SeqCst);
        match tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                self.buffered.fetch_sub(1, Ordering::SeqCst);
                warn!(event_id = %event.id(), session_id = %event.session_id(), "event queue full, dropping event");
                false
            }
            Err(TrySendError::Closed(event)) => {
                self.buffered.fetch_sub(1, Ordering::SeqCst);
                warn!(event_id = %event.id(), session_id = %event.session_id(), "event queue closed, dropping event");
                false
            }
        }
    }

    /// Wait for the next event
    ///
    /// Returns `None` when `cancel` fires, or when the queue is closed and
    /// every buffered event has been handed out.
    pub async fn dequeue(&self, cancel: &CancellationToken) -> Option<Event> {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            event = async { self.receiver.lock().await.recv().await } => event,
        };
        if event.is_some() {
            self.buffered.fetch_sub(1, Ordering::SeqCst);
        }
        event
    }

    /// Stop accepting new events. Idempotent.
    pub fn close(&self) {
        if self.sender.write().take().is_some() {
            debug!("event queue closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender.read().is_none()
    }

    /// Collect every event still buffered after [`close`](Self::close)
    ///
    /// Only the first call returns events.
    pub async fn drain(&self) -> Vec<Event> {
        if self.drained.swap(true, Ordering::SeqCst) {
            warn!("event queue already drained");
            return Vec::new();
        }
        if !self.is_closed() {
            warn!("draining an open event queue");
        }

        let mut receiver = self.receiver.lock().await;
        let mut remaining = Vec::new();
        loop {
            match receiver.try_recv() {
                Ok(event) => {
                    self.buffered.fetch_sub(1, Ordering::SeqCst);
                    remaining.push(event);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        remaining
    }

    /// Current number of buffered events (racy, for observability)
    pub fn len(&self) -> usize {
        self.buffered.load(Ordering::SeqCst).min(self.capacity)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn queue(capacity: usize) -> EventQueue {
        EventQueue::new(NonZeroUsize::new(capacity).unwrap())
    }

    #[test]
    fn test_enqueue_drops_when_full() {
        let q = queue(3);
        let accepted: Vec<bool> = (0..5).map(|i| q.enqueue(Event::join("s1", format!("u{}", i)))).collect();

        assert_eq!(accepted, vec![true, true, true, false, false]);
        assert_eq!(q.len(), 3);
        assert_eq!(q.capacity(), 3);
    }

    #[tokio::test]
    async fn test_dequeue_preserves_fifo_order() {
        let q = queue(4);
        let events: Vec<Event> = (0..4).map(|i| Event::join("s1", format!("u{}", i))).collect();
        for event in &events {
            assert!(q.enqueue(event.clone()));
        }

        let cancel = CancellationToken::new();
        for expected in &events {
            let got = q.dequeue(&cancel).await.unwrap();
            assert_eq!(got.id(), expected.id());
        }
        assert!(q.is_empty());
    }

    #[tokio::test]
    async fn test_close_then_drain_returns_buffered_exactly_once() {
        let q = queue(8);
        let ids: Vec<String> = (0..5)
            .map(|i| {
                let event = Event::join("s1", format!("u{}", i));
                let id = event.id().to_string();
                assert!(q.enqueue(event));
                id
            })
            .collect();

        q.close();
        q.close();
        assert!(!q.enqueue(Event::join("s1", "late")));

        let drained: Vec<String> = q.drain().await.iter().map(|e| e.id().to_string()).collect();
        assert_eq!(drained, ids);
        assert!(q.drain().await.is_empty());
        assert_eq!(q.len(), 0);
    }

    #[tokio::test]
    async fn test_dequeue_after_close_hands_out_remaining_then_none() {
        let q = queue(4);
        q.enqueue(Event::join("s1", "a"));
        q.enqueue(Event::join("s1", "b"));
        q.close();

        let cancel = CancellationToken::new();
        assert_eq!(q.dequeue(&cancel).await.unwrap().user_id(), "a");
        assert_eq!(q.dequeue(&cancel).await.unwrap().user_id(), "b");
        assert!(q.dequeue(&cancel).await.is_none());
    }

    #[tokio::test]
    async fn test_dequeue_returns_none_on_cancel() {
        let q = queue(4);
        let cancel = CancellationToken::new();

        let waiter = {
            let cancel = cancel.clone();
            async move { q.dequeue(&cancel).await }
        };
        let canceller = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        };

        let (event, ()) = tokio::join!(waiter, canceller);
        assert!(event.is_none());
    }
}
