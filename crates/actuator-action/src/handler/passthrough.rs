//! Passthrough implementation: the output is the input.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ActionError;
use crate::handler::ActionImplementation;
use crate::interface::ActionInterface;
use crate::types::ActionPayload;

/// Implementation with no logic of its own; the connector does all the work.
pub struct PassthroughImplementation {
    interface: ActionInterface,
    idle_tick: Duration,
}

impl PassthroughImplementation {
    pub fn new(interface: ActionInterface, idle_tick: Duration) -> Self {
        Self {
            interface,
            idle_tick,
        }
    }
}

#[async_trait]
impl ActionImplementation for PassthroughImplementation {
    fn make_input(&self, raw: &serde_json::Value) -> Result<ActionPayload, ActionError> {
        self.interface.parse(raw)
    }

    async fn execute(&self, input: ActionPayload) -> Result<ActionPayload, ActionError> {
        Ok(input)
    }

    fn tick(&self) -> Result<(), ActionError> {
        std::thread::sleep(self.idle_tick);
        Ok(())
    }
}
