//! Scripted implementations and connectors shared by unit tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ActionError;
use crate::handler::{ActionConnector, ActionImplementation, AgentAction};
use crate::interface::ActionInterface;
use crate::registry::ActionRegistry;
use crate::types::ActionPayload;

type TickScript = Box<dyn Fn(u64) -> Result<(), ActionError> + Send + Sync>;

pub(crate) struct ScriptedImplementation {
    interface: ActionInterface,
    delay: Duration,
    fail_execute: bool,
    tick_script: TickScript,
    pub tick_calls: AtomicU64,
    pub executions: AtomicU64,
}

impl ScriptedImplementation {
    pub fn new(interface: ActionInterface) -> Self {
        Self {
            interface,
            delay: Duration::ZERO,
            fail_execute: false,
            tick_script: Box::new(|_| Ok(())),
            tick_calls: AtomicU64::new(0),
            executions: AtomicU64::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail_execute = true;
        self
    }

    /// Script receives the 1-based call number.
    pub fn with_tick<F>(mut self, script: F) -> Self
    where
        F: Fn(u64) -> Result<(), ActionError> + Send + Sync + 'static,
    {
        self.tick_script = Box::new(script);
        self
    }
}

#[async_trait]
impl ActionImplementation for ScriptedImplementation {
    fn make_input(&self, raw: &serde_json::Value) -> Result<ActionPayload, ActionError> {
        self.interface.parse(raw)
    }

    async fn execute(&self, input: ActionPayload) -> Result<ActionPayload, ActionError> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail_execute {
            return Err(ActionError::ExecutionFailed("scripted failure".to_string()));
        }
        Ok(input)
    }

    fn tick(&self) -> Result<(), ActionError> {
        let n = self.tick_calls.fetch_add(1, Ordering::SeqCst) + 1;
        std::thread::sleep(Duration::from_millis(1));
        (self.tick_script)(n)
    }
}

#[derive(Default)]
pub(crate) struct RecordingConnector {
    fail: bool,
    pub connected: Mutex<Vec<ActionPayload>>,
    pub tick_calls: AtomicU64,
}

impl RecordingConnector {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn outputs(&self) -> Vec<ActionPayload> {
        self.connected.lock().unwrap().clone()
    }
}

#[async_trait]
impl ActionConnector for RecordingConnector {
    async fn connect(&self, output: ActionPayload) -> Result<(), ActionError> {
        self.connected.lock().unwrap().push(output);
        if self.fail {
            return Err(ActionError::ConnectFailed("scripted failure".to_string()));
        }
        Ok(())
    }

    fn tick(&self) -> Result<(), ActionError> {
        self.tick_calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(1));
        Ok(())
    }
}

pub(crate) fn scripted_action(
    label: &str,
    implementation: Arc<ScriptedImplementation>,
    connector: Arc<RecordingConnector>,
) -> AgentAction {
    AgentAction::new(
        label,
        label,
        implementation.interface,
        implementation,
        connector,
    )
}

pub(crate) fn registry_of(actions: Vec<AgentAction>) -> ActionRegistry {
    let mut registry = ActionRegistry::new();
    for action in actions {
        registry.register(action);
    }
    registry
}

/// Poll `cond` until it holds or `timeout` elapses.
pub(crate) fn wait_until(timeout: Duration, cond: impl Fn() -> bool) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    while std::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    cond()
}
