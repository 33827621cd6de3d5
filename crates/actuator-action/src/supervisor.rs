//! Worker supervisor.
//!
//! Runs every action's implementation and connector `tick()` in its own
//! dedicated thread so that a slow or crashing action can never starve the
//! others or block command dispatch. Loops poll a cancellation token and
//! exit on shutdown.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::error::{ActionError, SupervisorError};
use crate::registry::ActionRegistry;

/// Which half of an action a worker loop drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerRole {
    Implementation,
    Connector,
}

impl fmt::Display for WorkerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerRole::Implementation => write!(f, "impl"),
            WorkerRole::Connector => write!(f, "connector"),
        }
    }
}

/// Tick counters for one worker loop.
#[derive(Debug, Default)]
pub struct WorkerStats {
    ticks: AtomicU64,
    failures: AtomicU64,
}

impl WorkerStats {
    fn record(&self, ok: bool) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> WorkerSnapshot {
        WorkerSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`WorkerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerSnapshot {
    /// Completed tick invocations, failed ones included.
    pub ticks: u64,
    /// Invocations that returned an error or panicked.
    pub failures: u64,
}

/// Outcome of [`WorkerSupervisor::shutdown`].
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Loops that exited and were joined.
    pub stopped: usize,
    /// Loops still inside a tick when the timeout expired.
    pub detached: Vec<String>,
}

type WorkerKey = (String, WorkerRole);

/// Owns the worker threads of every registered action.
pub struct WorkerSupervisor {
    cancel: CancellationToken,
    handles: HashMap<WorkerKey, JoinHandle<()>>,
    stats: HashMap<WorkerKey, Arc<WorkerStats>>,
}

impl WorkerSupervisor {
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            handles: HashMap::new(),
            stats: HashMap::new(),
        }
    }

    /// Spawn one implementation loop and one connector loop per label.
    ///
    /// Idempotent by label: labels that already have loops are skipped, so a
    /// repeated call (or a duplicate label) spawns nothing new. Returns the
    /// number of loops spawned by this call.
    pub fn start(&mut self, registry: &ActionRegistry) -> Result<usize, SupervisorError> {
        if self.cancel.is_cancelled() {
            return Err(SupervisorError::ShutDown);
        }

        let mut spawned = 0;
        for action in registry.iter() {
            let key = (action.label.clone(), WorkerRole::Implementation);
            if !self.stats.contains_key(&key) {
                let implementation = Arc::clone(&action.implementation);
                self.spawn(key, move || implementation.tick())?;
                spawned += 1;
            }

            let key = (action.label.clone(), WorkerRole::Connector);
            if !self.stats.contains_key(&key) {
                let connector = Arc::clone(&action.connector);
                self.spawn(key, move || connector.tick())?;
                spawned += 1;
            }
        }

        if spawned > 0 {
            tracing::info!(spawned, total = self.handles.len(), "Worker loops started");
        }
        Ok(spawned)
    }

    fn spawn<F>(&mut self, key: WorkerKey, tick: F) -> Result<(), SupervisorError>
    where
        F: Fn() -> Result<(), ActionError> + Send + 'static,
    {
        let (label, role) = key.clone();
        let name = format!("{}:{}", role, label);
        let stats = Arc::new(WorkerStats::default());
        let loop_stats = Arc::clone(&stats);
        let cancel = self.cancel.clone();

        let handle = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || run_tick_loop(&label, role, tick, &loop_stats, &cancel))
            .map_err(|e| SupervisorError::Spawn {
                name,
                reason: e.to_string(),
            })?;

        self.handles.insert(key.clone(), handle);
        self.stats.insert(key, stats);
        Ok(())
    }

    /// Counters for one loop, available before and after shutdown.
    pub fn stats(&self, label: &str, role: WorkerRole) -> Option<WorkerSnapshot> {
        self.stats
            .get(&(label.to_string(), role))
            .map(|s| s.snapshot())
    }

    /// Number of loops currently owned (not yet joined or detached).
    pub fn worker_count(&self) -> usize {
        self.handles.len()
    }

    pub fn is_running(&self, label: &str) -> bool {
        [WorkerRole::Implementation, WorkerRole::Connector]
            .iter()
            .any(|role| {
                self.handles
                    .get(&(label.to_string(), *role))
                    .is_some_and(|h| !h.is_finished())
            })
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Signal every loop to stop and join them, waiting at most `timeout`.
    ///
    /// A loop stuck inside a long tick is detached rather than waited on.
    pub fn shutdown(&mut self, timeout: Duration) -> ShutdownReport {
        self.cancel.cancel();
        let deadline = Instant::now() + timeout;
        let mut report = ShutdownReport::default();

        for ((label, role), handle) in self.handles.drain() {
            while !handle.is_finished() && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(5));
            }
            if handle.is_finished() {
                if handle.join().is_err() {
                    tracing::error!(label = %label, role = %role, "Worker thread panicked outside tick");
                }
                report.stopped += 1;
            } else {
                tracing::warn!(label = %label, role = %role, "Worker loop did not stop in time, detaching");
                report.detached.push(format!("{}:{}", role, label));
            }
        }

        tracing::info!(
            stopped = report.stopped,
            detached = report.detached.len(),
            "Worker loops shut down"
        );
        report
    }
}

impl Default for WorkerSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for WorkerSupervisor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Invoke `tick` until cancelled. Errors and panics are counted and logged;
/// neither ends the loop.
fn run_tick_loop<F>(
    label: &str,
    role: WorkerRole,
    tick: F,
    stats: &WorkerStats,
    cancel: &CancellationToken,
) where
    F: Fn() -> Result<(), ActionError>,
{
    tracing::info!(label = %label, role = %role, "Worker loop started");

    while !cancel.is_cancelled() {
        match catch_unwind(AssertUnwindSafe(&tick)) {
            Ok(Ok(())) => stats.record(true),
            Ok(Err(e)) => {
                stats.record(false);
                tracing::error!(label = %label, role = %role, error = %e, "Tick failed");
            }
            Err(panic) => {
                stats.record(false);
                tracing::error!(
                    label = %label,
                    role = %role,
                    panic = %panic_message(panic.as_ref()),
                    "Tick panicked"
                );
            }
        }
    }

    tracing::info!(label = %label, role = %role, "Worker loop stopped");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::ActionInterface;
    use crate::testing::{registry_of, scripted_action, wait_until, RecordingConnector, ScriptedImplementation};

    const WAIT: Duration = Duration::from_secs(5);

    fn counting(label: &str) -> (ActionRegistry, Arc<ScriptedImplementation>, Arc<RecordingConnector>) {
        let imp = Arc::new(ScriptedImplementation::new(ActionInterface::Speak));
        let conn = Arc::new(RecordingConnector::default());
        let registry = registry_of(vec![scripted_action(label, Arc::clone(&imp), Arc::clone(&conn))]);
        (registry, imp, conn)
    }

    #[test]
    fn test_start_spawns_two_loops_per_action() {
        let imp_a = Arc::new(ScriptedImplementation::new(ActionInterface::Move));
        let imp_b = Arc::new(ScriptedImplementation::new(ActionInterface::Speak));
        let registry = registry_of(vec![
            scripted_action("move", Arc::clone(&imp_a), Arc::new(RecordingConnector::default())),
            scripted_action("speak", Arc::clone(&imp_b), Arc::new(RecordingConnector::default())),
        ]);

        let mut supervisor = WorkerSupervisor::new();
        assert_eq!(supervisor.start(&registry).unwrap(), 4);
        assert_eq!(supervisor.worker_count(), 4);
        assert!(supervisor.is_running("move"));
        assert!(supervisor.is_running("speak"));

        assert!(wait_until(WAIT, || {
            imp_a.tick_calls.load(Ordering::SeqCst) > 0 && imp_b.tick_calls.load(Ordering::SeqCst) > 0
        }));
        supervisor.shutdown(WAIT);
    }

    #[test]
    fn test_start_is_idempotent_by_label() {
        let (registry, _imp, _conn) = counting("speak");
        let mut supervisor = WorkerSupervisor::new();
        assert_eq!(supervisor.start(&registry).unwrap(), 2);
        assert_eq!(supervisor.start(&registry).unwrap(), 0);
        assert_eq!(supervisor.worker_count(), 2);
        supervisor.shutdown(WAIT);
    }

    #[test]
    fn test_duplicate_label_gets_one_pair_of_loops() {
        let first = Arc::new(ScriptedImplementation::new(ActionInterface::Speak));
        let second = Arc::new(ScriptedImplementation::new(ActionInterface::Speak));
        let registry = registry_of(vec![
            scripted_action("speak", Arc::clone(&first), Arc::new(RecordingConnector::default())),
            scripted_action("speak", Arc::clone(&second), Arc::new(RecordingConnector::default())),
        ]);
        let mut supervisor = WorkerSupervisor::new();
        assert_eq!(supervisor.start(&registry).unwrap(), 2);
        assert!(wait_until(WAIT, || first.tick_calls.load(Ordering::SeqCst) > 0));
        assert_eq!(second.tick_calls.load(Ordering::SeqCst), 0);
        supervisor.shutdown(WAIT);
    }

    #[test]
    fn test_loop_survives_failing_ticks() {
        let imp = Arc::new(
            ScriptedImplementation::new(ActionInterface::Speak).with_tick(|n| {
                if n % 2 == 1 {
                    Err(ActionError::TickFailed(format!("call {}", n)))
                } else {
                    Ok(())
                }
            }),
        );
        let registry = registry_of(vec![scripted_action(
            "flaky",
            Arc::clone(&imp),
            Arc::new(RecordingConnector::default()),
        )]);

        let mut supervisor = WorkerSupervisor::new();
        supervisor.start(&registry).unwrap();
        assert!(wait_until(WAIT, || imp.tick_calls.load(Ordering::SeqCst) >= 10));
        supervisor.shutdown(WAIT);

        let stats = supervisor.stats("flaky", WorkerRole::Implementation).unwrap();
        assert!(stats.ticks >= 10);
        assert!(stats.failures >= 5);
        assert!(stats.ticks > stats.failures);
    }

    #[test]
    fn test_loop_survives_always_failing_tick() {
        let imp = Arc::new(
            ScriptedImplementation::new(ActionInterface::Speak)
                .with_tick(|_| Err(ActionError::TickFailed("sensor offline".to_string()))),
        );
        let registry = registry_of(vec![scripted_action(
            "broken",
            Arc::clone(&imp),
            Arc::new(RecordingConnector::default()),
        )]);

        let mut supervisor = WorkerSupervisor::new();
        supervisor.start(&registry).unwrap();
        assert!(wait_until(WAIT, || imp.tick_calls.load(Ordering::SeqCst) >= 5));
        supervisor.shutdown(WAIT);

        let stats = supervisor.stats("broken", WorkerRole::Implementation).unwrap();
        assert_eq!(stats.ticks, stats.failures);
    }

    #[test]
    fn test_loop_survives_panicking_tick() {
        let imp = Arc::new(
            ScriptedImplementation::new(ActionInterface::Speak).with_tick(|n| {
                if n == 1 {
                    panic!("first tick explodes");
                }
                Ok(())
            }),
        );
        let registry = registry_of(vec![scripted_action(
            "panicky",
            Arc::clone(&imp),
            Arc::new(RecordingConnector::default()),
        )]);

        let mut supervisor = WorkerSupervisor::new();
        supervisor.start(&registry).unwrap();
        assert!(wait_until(WAIT, || imp.tick_calls.load(Ordering::SeqCst) >= 3));
        supervisor.shutdown(WAIT);

        let stats = supervisor.stats("panicky", WorkerRole::Implementation).unwrap();
        assert_eq!(stats.failures, 1);
        assert!(stats.ticks >= 3);
    }

    #[test]
    fn test_failing_action_does_not_affect_others() {
        let broken = Arc::new(
            ScriptedImplementation::new(ActionInterface::Speak)
                .with_tick(|_| panic!("always")),
        );
        let healthy = Arc::new(ScriptedImplementation::new(ActionInterface::Move));
        let registry = registry_of(vec![
            scripted_action("broken", Arc::clone(&broken), Arc::new(RecordingConnector::default())),
            scripted_action("healthy", Arc::clone(&healthy), Arc::new(RecordingConnector::default())),
        ]);

        let mut supervisor = WorkerSupervisor::new();
        supervisor.start(&registry).unwrap();
        assert!(wait_until(WAIT, || healthy.tick_calls.load(Ordering::SeqCst) >= 10));
        supervisor.shutdown(WAIT);

        let stats = supervisor.stats("healthy", WorkerRole::Implementation).unwrap();
        assert_eq!(stats.failures, 0);
    }

    #[test]
    fn test_connector_loop_ticks() {
        let (registry, _imp, conn) = counting("speak");
        let mut supervisor = WorkerSupervisor::new();
        supervisor.start(&registry).unwrap();
        assert!(wait_until(WAIT, || conn.tick_calls.load(Ordering::SeqCst) >= 3));
        supervisor.shutdown(WAIT);
    }

    #[test]
    fn test_shutdown_stops_loops() {
        let (registry, imp, _conn) = counting("speak");
        let mut supervisor = WorkerSupervisor::new();
        supervisor.start(&registry).unwrap();
        assert!(wait_until(WAIT, || imp.tick_calls.load(Ordering::SeqCst) > 0));

        let report = supervisor.shutdown(WAIT);
        assert_eq!(report.stopped, 2);
        assert!(report.detached.is_empty());
        assert_eq!(supervisor.worker_count(), 0);
        assert!(supervisor.is_shut_down());

        let after = imp.tick_calls.load(Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(imp.tick_calls.load(Ordering::SeqCst), after);
    }

    #[test]
    fn test_shutdown_detaches_stuck_loop() {
        let imp = Arc::new(ScriptedImplementation::new(ActionInterface::Speak).with_tick(|_| {
            std::thread::sleep(Duration::from_millis(300));
            Ok(())
        }));
        let registry = registry_of(vec![scripted_action(
            "slow",
            Arc::clone(&imp),
            Arc::new(RecordingConnector::default()),
        )]);
        let mut supervisor = WorkerSupervisor::new();
        supervisor.start(&registry).unwrap();
        assert!(wait_until(WAIT, || imp.tick_calls.load(Ordering::SeqCst) > 0));

        let report = supervisor.shutdown(Duration::from_millis(10));
        assert_eq!(report.detached, vec!["impl:slow".to_string()]);
        assert_eq!(report.stopped, 1);
    }

    #[test]
    fn test_start_after_shutdown_fails() {
        let (registry, _imp, _conn) = counting("speak");
        let mut supervisor = WorkerSupervisor::new();
        supervisor.shutdown(WAIT);
        assert!(matches!(
            supervisor.start(&registry),
            Err(SupervisorError::ShutDown)
        ));
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
