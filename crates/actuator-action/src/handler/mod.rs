//! Action capabilities and the concrete variants that implement them.
//!
//! An action pairs an [`ActionImplementation`] (does the work) with an
//! [`ActionConnector`] (applies the result). Both expose a blocking `tick()`
//! driven by a dedicated worker loop, and an async method driven by
//! dispatched tasks.

pub mod guarded_move;
pub mod log;
pub mod passthrough;
pub mod publish;
pub mod twist;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::bus::ActionBus;
use crate::error::{ActionError, RegistryError};
use crate::interface::ActionInterface;
use crate::types::{ActionOptions, ActionPayload};
use actuator_core::config::ActionSpec;

/// Sleep used by `tick()` when a variant has no polling work.
pub const DEFAULT_IDLE_TICK: Duration = Duration::from_secs(1);

/// The work side of an action.
#[async_trait]
pub trait ActionImplementation: Send + Sync {
    /// Build the typed input from a command's raw value.
    fn make_input(&self, raw: &serde_json::Value) -> Result<ActionPayload, ActionError>;

    /// Perform the action. May suspend on I/O.
    async fn execute(&self, input: ActionPayload) -> Result<ActionPayload, ActionError>;

    /// One iteration of background polling. Called in a loop on a dedicated
    /// thread; must pace itself.
    fn tick(&self) -> Result<(), ActionError> {
        std::thread::sleep(DEFAULT_IDLE_TICK);
        Ok(())
    }
}

/// The output side of an action.
#[async_trait]
pub trait ActionConnector: Send + Sync {
    /// Deliver an implementation's output to its real-world effect.
    async fn connect(&self, output: ActionPayload) -> Result<(), ActionError>;

    /// One iteration of background polling. Called in a loop on a dedicated
    /// thread; must pace itself.
    fn tick(&self) -> Result<(), ActionError> {
        std::thread::sleep(DEFAULT_IDLE_TICK);
        Ok(())
    }
}

/// A registered action. Built once at startup and never mutated.
pub struct AgentAction {
    pub name: String,
    pub label: String,
    pub interface: ActionInterface,
    pub implementation: Arc<dyn ActionImplementation>,
    pub connector: Arc<dyn ActionConnector>,
}

impl AgentAction {
    pub fn new(
        name: impl Into<String>,
        label: impl Into<String>,
        interface: ActionInterface,
        implementation: Arc<dyn ActionImplementation>,
        connector: Arc<dyn ActionConnector>,
    ) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            interface,
            implementation,
            connector,
        }
    }

    pub fn describe(&self) -> String {
        self.interface.describe(&self.label)
    }
}

impl std::fmt::Debug for AgentAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentAction")
            .field("name", &self.name)
            .field("label", &self.label)
            .field("interface", &self.interface)
            .finish_non_exhaustive()
    }
}

/// Shared resources handed to variants while the registry is built.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub bus: ActionBus,
    pub idle_tick: Duration,
}

impl BuildContext {
    pub fn new(bus: ActionBus, idle_tick: Duration) -> Self {
        Self { bus, idle_tick }
    }
}

impl Default for BuildContext {
    fn default() -> Self {
        Self::new(ActionBus::default(), DEFAULT_IDLE_TICK)
    }
}

/// Construct one action from its config entry.
///
/// Variants are selected by name; an unknown name is a startup error.
pub fn build_action(spec: &ActionSpec, ctx: &BuildContext) -> Result<AgentAction, RegistryError> {
    let interface: ActionInterface = spec.name.parse()?;
    let options = ActionOptions::new(spec.config.clone());

    let implementation: Arc<dyn ActionImplementation> = match spec.implementation.as_str() {
        "passthrough" => Arc::new(passthrough::PassthroughImplementation::new(
            interface,
            ctx.idle_tick,
        )),
        "guarded_move" if interface == ActionInterface::Move => Arc::new(
            guarded_move::GuardedMoveImplementation::from_options(&options, ctx)?,
        ),
        other => {
            return Err(RegistryError::UnknownImplementation {
                action: spec.name.clone(),
                implementation: other.to_string(),
            })
        }
    };

    let connector: Arc<dyn ActionConnector> = match spec.connector.as_str() {
        "log" => Arc::new(log::LogConnector::new(&spec.label, ctx.idle_tick)),
        "bus" => Arc::new(publish::BusConnector::from_options(
            &spec.label,
            &options,
            ctx,
        )?),
        "twist" if interface == ActionInterface::Move => {
            Arc::new(twist::TwistConnector::from_options(&options, ctx)?)
        }
        other => {
            return Err(RegistryError::UnknownConnector {
                action: spec.name.clone(),
                connector: other.to_string(),
            })
        }
    };

    Ok(AgentAction::new(
        spec.name.clone(),
        spec.label.clone(),
        interface,
        implementation,
        connector,
    ))
}

/// Robot id from the option table, falling back to "default".
pub(crate) fn urid_option(options: &ActionOptions) -> Result<String, RegistryError> {
    Ok(options
        .str("urid")?
        .unwrap_or(actuator_core::config::DEFAULT_URID)
        .to_string())
}
