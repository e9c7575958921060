//! Event pipeline: bounded queue plus a single worker
//!
//! Recorded actions are queued here and applied to cached sessions by
//! exactly one background task, strictly in submission order. Submission
//! never waits: a full queue rejects the action immediately and the action
//! is dropped.
//!
//! Shutdown is cooperative. [`EventPipeline::shutdown`] stops intake, lets
//! the worker drain everything already queued, and waits for it to exit.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cache::SessionCache;
use crate::consequence::apply_action;
use crate::error::{LoreError, Result};
use crate::session::ActionEvent;

/// Snapshot of the pipeline counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    /// Actions accepted onto the queue
    pub accepted: u64,
    /// Actions applied to their session
    pub processed: u64,
    /// Actions the worker could not apply
    pub failed: u64,
    /// Actions rejected because the queue was full
    pub dropped: u64,
}

#[derive(Default)]
struct Counters {
    accepted: AtomicU64,
    processed: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
    settled: Notify,
}

impl Counters {
    fn snapshot(&self) -> PipelineStats {
        PipelineStats {
            accepted: self.accepted.load(Ordering::SeqCst),
            processed: self.processed.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            dropped: self.dropped.load(Ordering::SeqCst),
        }
    }
}

struct QueuedAction {
    session_id: String,
    event: ActionEvent,
}

/// Bounded queue of recorded actions with one applying worker
pub struct EventPipeline {
    tx: mpsc::Sender<QueuedAction>,
    capacity: usize,
    cancel: CancellationToken,
    paused: watch::Sender<bool>,
    counters: Arc<Counters>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl EventPipeline {
    /// Start the worker. Applied actions are trimmed to `max_actions` per
    /// session.
    pub fn spawn(cache: Arc<SessionCache>, capacity: usize, max_actions: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let (paused, paused_rx) = watch::channel(false);
        let cancel = CancellationToken::new();
        let counters = Arc::new(Counters::default());

        let worker = Worker {
            cache,
            max_actions,
            rx,
            paused: paused_rx,
            cancel: cancel.clone(),
            counters: counters.clone(),
        };
        let handle = tokio::spawn(worker.run());

        Self {
            tx,
            capacity,
            cancel,
            paused,
            counters,
            worker: Mutex::new(Some(handle)),
        }
    }

    /// Queue an action for `session_id` without waiting.
    ///
    /// # Errors
    ///
    /// `QueueFull` when the queue is at capacity (the action is dropped),
    /// `ShuttingDown` once shutdown has begun.
    pub fn submit(&self, session_id: impl Into<String>, event: ActionEvent) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(LoreError::ShuttingDown);
        }

        let queued = QueuedAction {
            session_id: session_id.into(),
            event,
        };
        match self.tx.try_send(queued) {
            Ok(()) => {
                self.counters.accepted.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(rejected)) => {
                self.counters.dropped.fetch_add(1, Ordering::SeqCst);
                warn!(
                    session_id = %rejected.session_id,
                    capacity = self.capacity,
                    "Event queue full, dropping action"
                );
                Err(LoreError::QueueFull {
                    capacity: self.capacity,
                })
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(LoreError::ShuttingDown),
        }
    }

    /// Actions currently waiting in the queue
    pub fn depth(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// Configured queue capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Counter snapshot
    pub fn stats(&self) -> PipelineStats {
        self.counters.snapshot()
    }

    /// Stop the worker from taking new actions; queued ones stay queued
    pub fn pause(&self) {
        self.paused.send_replace(true);
        debug!("Event pipeline paused");
    }

    /// Let the worker continue
    pub fn resume(&self) {
        self.paused.send_replace(false);
        debug!("Event pipeline resumed");
    }

    /// True while paused
    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }

    /// True once shutdown has begun
    pub fn is_shutting_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait until every accepted action has been applied or has failed.
    /// Never returns while the pipeline is paused with work queued.
    pub async fn wait_idle(&self) {
        loop {
            let settled = self.counters.settled.notified();
            tokio::pin!(settled);
            settled.as_mut().enable();

            let stats = self.counters.snapshot();
            if stats.processed + stats.failed >= stats.accepted {
                return;
            }
            settled.await;
        }
    }

    /// Stop intake, drain the queue and wait for the worker to exit
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.paused.send_replace(false);

        if let Some(handle) = self.worker.lock().await.take()
            && let Err(e) = handle.await
        {
            error!(error = %e, "Event pipeline worker panicked");
        }
    }
}

impl Drop for EventPipeline {
    fn drop(&mut self) {
        // The worker still drains whatever is queued before exiting.
        self.cancel.cancel();
    }
}

struct Worker {
    cache: Arc<SessionCache>,
    max_actions: usize,
    rx: mpsc::Receiver<QueuedAction>,
    paused: watch::Receiver<bool>,
    cancel: CancellationToken,
    counters: Arc<Counters>,
}

impl Worker {
    async fn run(mut self) {
        debug!("Event pipeline worker started");

        'intake: loop {
            while *self.paused.borrow_and_update() {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => break 'intake,
                    changed = self.paused.changed() => {
                        if changed.is_err() {
                            break 'intake;
                        }
                    }
                }
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break 'intake,
                changed = self.paused.changed() => {
                    if changed.is_err() {
                        break 'intake;
                    }
                }
                queued = self.rx.recv() => match queued {
                    Some(queued) => self.apply(queued).await,
                    None => break 'intake,
                },
            }
        }

        self.rx.close();
        let mut drained = 0usize;
        while let Some(queued) = self.rx.recv().await {
            self.apply(queued).await;
            drained += 1;
        }
        info!(drained, "Event pipeline worker stopped");
    }

    async fn apply(&self, queued: QueuedAction) {
        let QueuedAction { session_id, event } = queued;
        let action_id = event.id.clone();
        let max_actions = self.max_actions;

        let result = self
            .cache
            .update(&session_id, move |session| {
                apply_action(session, event, max_actions, Utc::now())
            })
            .await;

        match result {
            Ok(()) => {
                self.counters.processed.fetch_add(1, Ordering::SeqCst);
                debug!(session_id = %session_id, action_id = %action_id, "Applied action");
            }
            Err(e) => {
                self.counters.failed.fetch_add(1, Ordering::SeqCst);
                error!(session_id = %session_id, action_id = %action_id, error = %e, "Failed to apply action");
            }
        }
        self.counters.settled.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ActionRequest;
    use crate::storage::InMemorySessionStore;

    fn setup(capacity: usize) -> (Arc<SessionCache>, EventPipeline) {
        let cache = Arc::new(SessionCache::new(Arc::new(InMemorySessionStore::new())));
        let pipeline = EventPipeline::spawn(cache.clone(), capacity, 50);
        (cache, pipeline)
    }

    fn event(command: &str) -> ActionEvent {
        ActionRequest::new(command).into_event("village", Utc::now())
    }

    #[tokio::test]
    async fn test_applies_in_submission_order() {
        let (cache, pipeline) = setup(16);
        for i in 0..10 {
            pipeline.submit("s1", event(&format!("/step {}", i))).unwrap();
        }
        pipeline.wait_idle().await;

        let session = cache.get("s1").await.unwrap();
        let commands: Vec<_> = session.actions.iter().map(|a| a.command.clone()).collect();
        let expected: Vec<_> = (0..10).map(|i| format!("/step {}", i)).collect();
        assert_eq!(commands, expected);
        assert_eq!(pipeline.stats().processed, 10);
    }

    #[tokio::test]
    async fn test_full_queue_rejects() {
        let (_, pipeline) = setup(2);
        pipeline.pause();

        pipeline.submit("s1", event("/a")).unwrap();
        pipeline.submit("s1", event("/b")).unwrap();
        let err = pipeline.submit("s1", event("/c")).unwrap_err();
        assert!(err.is_capacity());
        assert_eq!(pipeline.depth(), 2);
        assert_eq!(pipeline.stats().dropped, 1);

        pipeline.resume();
        pipeline.wait_idle().await;
        assert_eq!(pipeline.depth(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_drains_and_refuses() {
        let (cache, pipeline) = setup(8);
        pipeline.pause();
        for i in 0..5 {
            pipeline.submit("s1", event(&format!("/x {}", i))).unwrap();
        }

        pipeline.shutdown().await;
        assert_eq!(cache.peek("s1").await.unwrap().actions.len(), 5);
        assert!(matches!(
            pipeline.submit("s1", event("/late")),
            Err(LoreError::ShuttingDown)
        ));
    }
}
