//! Action orchestrator.
//!
//! Owns the registry, the worker supervisor, the dispatcher and the promise
//! queue, and exposes the lifecycle the planning loop drives: `start`, then
//! any number of `submit`/`flush` cycles, then `shutdown`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use actuator_core::types::Command;

use crate::dispatcher::Dispatcher;
use crate::error::SupervisorError;
use crate::promise::{FlushReport, PendingPromise, PromiseQueue};
use crate::registry::ActionRegistry;
use crate::supervisor::{ShutdownReport, WorkerSupervisor};

pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Coordinates worker loops and command dispatch for one registry.
///
/// `submit` and `flush` take `&mut self`; the promise queue is only ever
/// touched from the task that drives the orchestrator.
pub struct ActionOrchestrator {
    registry: Arc<ActionRegistry>,
    supervisor: WorkerSupervisor,
    dispatcher: Dispatcher,
    promises: PromiseQueue,
    shutdown_timeout: Duration,
}

impl ActionOrchestrator {
    pub fn new(registry: ActionRegistry) -> Self {
        let registry = Arc::new(registry);
        Self {
            dispatcher: Dispatcher::new(Arc::clone(&registry)),
            registry,
            supervisor: WorkerSupervisor::new(),
            promises: PromiseQueue::new(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Start the worker loops of every registered action. Calling this again
    /// spawns nothing.
    pub fn start(&mut self) -> Result<usize, SupervisorError> {
        self.supervisor.start(&self.registry)
    }

    /// Dispatch a planner batch. Returns the number of tasks scheduled;
    /// commands with no matching action are skipped.
    pub fn submit(&mut self, commands: &[Command]) -> usize {
        self.dispatcher.dispatch(commands, &mut self.promises).len()
    }

    /// Reconcile finished tasks. Never waits on a running task.
    pub async fn flush(&mut self) -> FlushReport {
        self.promises.flush().await
    }

    pub fn pending_count(&self) -> usize {
        self.promises.len()
    }

    pub fn pending(&self) -> Vec<PendingPromise> {
        self.promises.pending()
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    pub fn supervisor(&self) -> &WorkerSupervisor {
        &self.supervisor
    }

    /// Flush every `poll` until no task is pending or `timeout` elapses.
    ///
    /// Completed tasks from every flush are merged in the order observed;
    /// `pending` holds whatever was still running at the end.
    pub async fn drain(&mut self, poll: Duration, timeout: Duration) -> FlushReport {
        let deadline = Instant::now() + timeout;
        let mut report = self.flush().await;

        while !report.pending.is_empty() && Instant::now() < deadline {
            tokio::time::sleep(poll).await;
            let next = self.flush().await;
            report.completed.extend(next.completed);
            report.pending = next.pending;
        }

        if !report.pending.is_empty() {
            tracing::warn!(
                pending = report.pending.len(),
                "Tasks still running after drain timeout"
            );
        }
        report
    }

    /// Stop all worker loops. Tasks already dispatched are not cancelled;
    /// drain first to observe them.
    pub fn shutdown(&mut self) -> ShutdownReport {
        tracing::info!(
            pending = self.promises.len(),
            "Shutting down action orchestrator"
        );
        self.supervisor.shutdown(self.shutdown_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ActionError;
    use crate::interface::ActionInterface;
    use crate::supervisor::WorkerRole;
    use crate::testing::{registry_of, scripted_action, wait_until, RecordingConnector, ScriptedImplementation};
    use crate::types::{ActionPayload, Movement, PromiseStatus};
    use std::sync::atomic::Ordering;

    const WAIT: Duration = Duration::from_secs(5);

    fn move_and_speak(
        move_impl: ScriptedImplementation,
        speak_impl: ScriptedImplementation,
    ) -> (ActionOrchestrator, Arc<RecordingConnector>, Arc<RecordingConnector>) {
        let move_conn = Arc::new(RecordingConnector::default());
        let speak_conn = Arc::new(RecordingConnector::default());
        let registry = registry_of(vec![
            scripted_action("move", Arc::new(move_impl), Arc::clone(&move_conn)),
            scripted_action("speak", Arc::new(speak_impl), Arc::clone(&speak_conn)),
        ]);
        (ActionOrchestrator::new(registry), move_conn, speak_conn)
    }

    #[tokio::test]
    async fn test_move_and_speak_scenario() {
        let (mut orchestrator, move_conn, speak_conn) = move_and_speak(
            ScriptedImplementation::new(ActionInterface::Move),
            ScriptedImplementation::new(ActionInterface::Speak),
        );
        orchestrator.start().unwrap();

        let scheduled = orchestrator.submit(&[
            Command::new("move", "move forwards"),
            Command::new("speak", "hi"),
        ]);
        assert_eq!(scheduled, 2);
        assert_eq!(orchestrator.pending_count(), 2);

        let report = orchestrator
            .drain(Duration::from_millis(5), WAIT)
            .await;
        assert_eq!(report.completed.len(), 2);
        assert!(report.pending.is_empty());
        assert!(report
            .completed
            .iter()
            .all(|p| p.status() == PromiseStatus::Succeeded));
        assert_eq!(move_conn.outputs(), vec![ActionPayload::Move(Movement::MoveForwards)]);
        assert_eq!(speak_conn.outputs(), vec![ActionPayload::Speak("hi".to_string())]);

        orchestrator.shutdown();
    }

    #[tokio::test]
    async fn test_unknown_command_scenario() {
        let (mut orchestrator, _, _) = move_and_speak(
            ScriptedImplementation::new(ActionInterface::Move),
            ScriptedImplementation::new(ActionInterface::Speak),
        );
        assert_eq!(orchestrator.submit(&[Command::new("dance", "x")]), 0);
        assert_eq!(orchestrator.pending_count(), 0);

        let report = orchestrator.flush().await;
        assert!(report.completed.is_empty());
        assert!(report.pending.is_empty());
    }

    #[tokio::test]
    async fn test_completed_reflects_finish_order() {
        let (mut orchestrator, _, _) = move_and_speak(
            ScriptedImplementation::new(ActionInterface::Move).with_delay(Duration::from_millis(80)),
            ScriptedImplementation::new(ActionInterface::Speak),
        );
        orchestrator.submit(&[
            Command::new("move", "turn left"),
            Command::new("speak", "quick"),
        ]);

        let report = orchestrator
            .drain(Duration::from_millis(5), WAIT)
            .await;
        let labels: Vec<_> = report.completed.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["speak", "move"]);
    }

    #[tokio::test]
    async fn test_running_task_never_reported_completed() {
        let (mut orchestrator, _, _) = move_and_speak(
            ScriptedImplementation::new(ActionInterface::Move).with_delay(Duration::from_secs(30)),
            ScriptedImplementation::new(ActionInterface::Speak),
        );
        orchestrator.submit(&[Command::new("move", "move back")]);

        let report = orchestrator.flush().await;
        assert!(report.completed.is_empty());
        assert_eq!(report.pending.len(), 1);
        assert_eq!(orchestrator.pending_count(), 1);
    }

    #[tokio::test]
    async fn test_execute_failure_is_observed_and_connect_skipped() {
        let (mut orchestrator, move_conn, _) = move_and_speak(
            ScriptedImplementation::new(ActionInterface::Move).failing(),
            ScriptedImplementation::new(ActionInterface::Speak),
        );
        orchestrator.submit(&[Command::new("move", "turn right")]);

        let report = orchestrator
            .drain(Duration::from_millis(5), WAIT)
            .await;
        assert_eq!(report.completed.len(), 1);
        assert_eq!(
            report.completed[0].outcome,
            Err(ActionError::ExecutionFailed("scripted failure".to_string()))
        );
        assert!(move_conn.outputs().is_empty());
    }

    #[tokio::test]
    async fn test_slow_action_does_not_block_submission() {
        let (mut orchestrator, _, speak_conn) = move_and_speak(
            ScriptedImplementation::new(ActionInterface::Move).with_delay(Duration::from_secs(30)),
            ScriptedImplementation::new(ActionInterface::Speak),
        );
        orchestrator.submit(&[Command::new("move", "move forwards")]);
        orchestrator.submit(&[Command::new("speak", "meanwhile")]);

        let report = orchestrator
            .drain(Duration::from_millis(5), Duration::from_millis(200))
            .await;
        assert_eq!(report.completed.len(), 1);
        assert_eq!(report.completed[0].label, "speak");
        assert_eq!(report.pending.len(), 1);
        assert_eq!(speak_conn.outputs().len(), 1);
    }

    #[tokio::test]
    async fn test_start_is_idempotent_and_loops_tick() {
        let move_impl = Arc::new(ScriptedImplementation::new(ActionInterface::Move));
        let registry = registry_of(vec![scripted_action(
            "move",
            Arc::clone(&move_impl),
            Arc::new(RecordingConnector::default()),
        )]);
        let mut orchestrator =
            ActionOrchestrator::new(registry).with_shutdown_timeout(WAIT);

        assert_eq!(orchestrator.start().unwrap(), 2);
        assert_eq!(orchestrator.start().unwrap(), 0);
        assert!(wait_until(WAIT, || move_impl.tick_calls.load(Ordering::SeqCst) > 0));

        let report = orchestrator.shutdown();
        assert_eq!(report.stopped, 2);
        assert!(orchestrator
            .supervisor()
            .stats("move", WorkerRole::Implementation)
            .is_some_and(|s| s.ticks > 0));
        assert!(matches!(orchestrator.start(), Err(SupervisorError::ShutDown)));
    }
}
