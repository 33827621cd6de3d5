//! Promise queue.
//!
//! Tracks in-flight dispatches. Outcomes are only observable through
//! [`PromiseQueue::flush`], which never waits on a running task.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use actuator_core::types::{Command, Timestamp};
use tokio::task::{JoinError, JoinHandle};
use uuid::Uuid;

use crate::error::ActionError;
use crate::types::{ActionPayload, PromiseStatus};

/// Result of a task body, stamped when the body returns.
struct Finished {
    sequence: u64,
    finished_at: Timestamp,
    outcome: Result<ActionPayload, ActionError>,
}

/// One scheduled dispatch.
struct Promise {
    id: Uuid,
    label: String,
    command: Command,
    submitted_at: Timestamp,
    handle: JoinHandle<Finished>,
}

/// A task that reached a terminal state, observed by a flush.
#[derive(Debug, Clone)]
pub struct CompletedPromise {
    pub id: Uuid,
    pub label: String,
    pub command: Command,
    pub submitted_at: Timestamp,
    pub finished_at: Timestamp,
    pub outcome: Result<ActionPayload, ActionError>,
}

impl CompletedPromise {
    pub fn status(&self) -> PromiseStatus {
        match self.outcome {
            Ok(_) => PromiseStatus::Succeeded,
            Err(_) => PromiseStatus::Failed,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// A task still running at the time of a flush.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingPromise {
    pub id: Uuid,
    pub label: String,
    pub command: Command,
    pub submitted_at: Timestamp,
}

impl PendingPromise {
    pub fn status(&self) -> PromiseStatus {
        PromiseStatus::Pending
    }
}

/// Output of one flush. A task id never appears in both lists.
#[derive(Debug, Default)]
pub struct FlushReport {
    /// Finished tasks in the order they finished.
    pub completed: Vec<CompletedPromise>,
    /// Still-running tasks in submission order.
    pub pending: Vec<PendingPromise>,
}

impl FlushReport {
    pub fn failures(&self) -> impl Iterator<Item = &CompletedPromise> {
        self.completed.iter().filter(|p| !p.is_success())
    }
}

/// Ordered collection of in-flight dispatches.
///
/// Not shared across threads: the dispatcher appends and `flush` filters,
/// both from the async side.
#[derive(Default)]
pub struct PromiseQueue {
    promises: Vec<Promise>,
    finish_order: Arc<AtomicU64>,
}

impl PromiseQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `body` onto the current Tokio runtime and track it.
    ///
    /// Returns as soon as the task is spawned. Must be called from within a
    /// runtime context.
    pub fn schedule<F>(&mut self, label: impl Into<String>, command: Command, body: F) -> Uuid
    where
        F: Future<Output = Result<ActionPayload, ActionError>> + Send + 'static,
    {
        let submitted_at = Timestamp::now();
        let finish_order = Arc::clone(&self.finish_order);
        let handle = tokio::spawn(async move {
            let outcome = body.await;
            Finished {
                sequence: finish_order.fetch_add(1, Ordering::SeqCst),
                finished_at: Timestamp::now(),
                outcome,
            }
        });

        let id = Uuid::new_v4();
        self.promises.push(Promise {
            id,
            label: label.into(),
            command,
            submitted_at,
            handle,
        });
        id
    }

    pub fn len(&self) -> usize {
        self.promises.len()
    }

    pub fn is_empty(&self) -> bool {
        self.promises.is_empty()
    }

    /// Snapshot of the tasks currently tracked, in submission order.
    pub fn pending(&self) -> Vec<PendingPromise> {
        self.promises.iter().map(Promise::to_pending).collect()
    }

    /// Partition the queue into finished and still-running tasks.
    ///
    /// Finished tasks are removed and their outcomes surfaced; running tasks
    /// stay queued in submission order. Only already-finished join handles
    /// are awaited, so this never waits on action work.
    pub async fn flush(&mut self) -> FlushReport {
        let (finished, running): (Vec<_>, Vec<_>) = std::mem::take(&mut self.promises)
            .into_iter()
            .partition(|p| p.handle.is_finished());
        self.promises = running;

        let mut completed = Vec::with_capacity(finished.len());
        for promise in finished {
            let Promise {
                id,
                label,
                command,
                submitted_at,
                handle,
            } = promise;

            let done = match handle.await {
                Ok(done) => done,
                Err(e) => self.aborted(&label, e),
            };

            completed.push((
                done.sequence,
                CompletedPromise {
                    id,
                    label,
                    command,
                    submitted_at,
                    finished_at: done.finished_at,
                    outcome: done.outcome,
                },
            ));
        }
        completed.sort_by_key(|(sequence, _)| *sequence);

        let report = FlushReport {
            completed: completed.into_iter().map(|(_, p)| p).collect(),
            pending: self.pending(),
        };
        if !report.completed.is_empty() {
            tracing::debug!(
                completed = report.completed.len(),
                pending = report.pending.len(),
                "Promises flushed"
            );
        }
        report
    }

    /// A task body that panicked or was cancelled never stamped its finish,
    /// so it is ordered by when the flush observed it.
    fn aborted(&self, label: &str, e: JoinError) -> Finished {
        let reason = if e.is_panic() {
            "task panicked".to_string()
        } else {
            e.to_string()
        };
        tracing::error!(label = %label, reason = %reason, "Dispatched task aborted");
        Finished {
            sequence: self.finish_order.fetch_add(1, Ordering::SeqCst),
            finished_at: Timestamp::now(),
            outcome: Err(ActionError::TaskAborted(reason)),
        }
    }
}

impl Promise {
    fn to_pending(&self) -> PendingPromise {
        PendingPromise {
            id: self.id,
            label: self.label.clone(),
            command: self.command.clone(),
            submitted_at: self.submitted_at,
        }
    }
}

impl std::fmt::Debug for PromiseQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromiseQueue")
            .field("len", &self.promises.len())
            .finish_non_exhaustive()
    }
}
