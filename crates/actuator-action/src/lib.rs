//! Action dispatch runtime for Actuator.
//!
//! Registers pluggable actions, keeps each action's background polling
//! loops alive in isolation, dispatches planner commands as concurrent
//! tasks, and reconciles their outcomes through a promise queue.

pub mod bus;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod interface;
pub mod orchestrator;
pub mod promise;
pub mod registry;
pub mod supervisor;
pub mod types;

#[cfg(test)]
mod testing;

pub use bus::{ActionBus, BusMessage};
pub use dispatcher::Dispatcher;
pub use error::{ActionError, RegistryError, SupervisorError};
pub use handler::{build_action, ActionConnector, ActionImplementation, AgentAction, BuildContext};
pub use interface::ActionInterface;
pub use orchestrator::ActionOrchestrator;
pub use promise::{CompletedPromise, FlushReport, PendingPromise, PromiseQueue};
pub use registry::ActionRegistry;
pub use supervisor::{ShutdownReport, WorkerRole, WorkerSnapshot, WorkerSupervisor};
pub use types::{ActionOptions, ActionPayload, Emotion, Movement, PromiseStatus};
