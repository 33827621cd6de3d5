//! Command dispatcher.
//!
//! Resolves each planner command to a registered action and schedules its
//! execution on the promise queue. Dispatch never waits on action work and
//! never fails synchronously: unknown labels are skipped with a warning and
//! every other error surfaces at flush.

use std::sync::Arc;

use actuator_core::types::Command;
use uuid::Uuid;

use crate::error::ActionError;
use crate::handler::AgentAction;
use crate::promise::PromiseQueue;
use crate::registry::ActionRegistry;
use crate::types::ActionPayload;

pub struct Dispatcher {
    registry: Arc<ActionRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ActionRegistry>) -> Self {
        Self { registry }
    }

    /// Schedule one task per resolvable command, in command order.
    ///
    /// Returns the ids of the tasks scheduled.
    pub fn dispatch(&self, commands: &[Command], queue: &mut PromiseQueue) -> Vec<Uuid> {
        let mut scheduled = Vec::with_capacity(commands.len());
        for command in commands {
            tracing::debug!(command = %command, "Dispatching command");

            let Some(action) = self.registry.get(&command.kind) else {
                tracing::warn!(
                    label = %command.kind,
                    "No action registered for command, skipping"
                );
                continue;
            };

            let input = action.implementation.make_input(&command.value);
            let label = action.label.clone();
            let id = queue.schedule(label, command.clone(), run(action, input));
            scheduled.push(id);
        }
        scheduled
    }
}

/// Task body: execute, then connect. `connect` only runs after a successful
/// `execute`; nothing is retried.
async fn run(
    action: Arc<AgentAction>,
    input: Result<ActionPayload, ActionError>,
) -> Result<ActionPayload, ActionError> {
    let input = input?;
    let output = action.implementation.execute(input).await?;
    action.connector.connect(output.clone()).await?;
    Ok(output)
}
