//! Background worker for reset sweeps.
//!
//! Callers dispatch a sweep without waiting for it. Requests go through a
//! bounded queue to a single worker task, so at most one sweep runs at a
//! time. When the queue is full a sweep is already pending and the request
//! is dropped. Outcomes are published on a broadcast channel.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use nodemgr_store::Store;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::orchestrator::{GroupOrchestrator, ResetReport};

/// Capacity of the outcome channel.
const EVENT_CHANNEL_SIZE: usize = 16;

/// A queued sweep request.
#[derive(Debug, Clone, Copy)]
struct ResetJob {
    requested_at: DateTime<Utc>,
}

/// Outcome of one sweep, as published to subscribers.
#[derive(Debug, Clone)]
pub enum ResetEvent {
    /// The sweep finished.
    Completed(ResetReport),
    /// The sweep failed; the error has already been logged.
    Failed(String),
}

/// Handle to the reset worker.
#[derive(Debug, Clone)]
pub struct ResetWorker {
    jobs: mpsc::Sender<ResetJob>,
    events: broadcast::Sender<ResetEvent>,
}

impl ResetWorker {
    /// Spawn the worker task on the current Tokio runtime.
    ///
    /// The task exits once every handle has been dropped.
    #[must_use]
    pub fn spawn<S: Store + 'static>(
        orchestrator: Arc<GroupOrchestrator<S>>,
        queue_capacity: usize,
    ) -> (Self, JoinHandle<()>) {
        let (jobs, rx) = mpsc::channel(queue_capacity.max(1));
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);

        let handle = tokio::spawn(run(orchestrator, rx, events.clone()));
        (Self { jobs, events }, handle)
    }

    /// Queue a sweep. Returns false if it was dropped.
    pub fn dispatch(&self) -> bool {
        let job = ResetJob {
            requested_at: Utc::now(),
        };
        match self.jobs.try_send(job) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::debug!("Reset sweep already pending, dropping request");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::error!("Reset worker has stopped, dropping request");
                false
            }
        }
    }

    /// Subscribe to sweep outcomes.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ResetEvent> {
        self.events.subscribe()
    }
}

async fn run<S: Store + 'static>(
    orchestrator: Arc<GroupOrchestrator<S>>,
    mut rx: mpsc::Receiver<ResetJob>,
    events: broadcast::Sender<ResetEvent>,
) {
    tracing::info!("Reset worker started");

    while let Some(job) = rx.recv().await {
        let waited_ms = (Utc::now() - job.requested_at).num_milliseconds();
        tracing::debug!(waited_ms, "Running reset sweep");

        let event = match orchestrator.reset_group_list().await {
            Ok(report) => ResetEvent::Completed(report),
            Err(e) => {
                tracing::error!(error = %e, "Reset sweep failed");
                ResetEvent::Failed(e.to_string())
            }
        };
        // No subscribers is fine.
        let _ = events.send(event);
    }

    tracing::info!("Reset worker stopped");
}
