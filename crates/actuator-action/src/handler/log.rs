//! Log connector.
//!
//! Applies an output by logging it. Useful for dry runs and for actions
//! whose effect is the log itself.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ActionError;
use crate::handler::ActionConnector;
use crate::types::ActionPayload;

pub struct LogConnector {
    label: String,
    idle_tick: Duration,
}

impl LogConnector {
    pub fn new(label: impl Into<String>, idle_tick: Duration) -> Self {
        Self {
            label: label.into(),
            idle_tick,
        }
    }
}

#[async_trait]
impl ActionConnector for LogConnector {
    async fn connect(&self, output: ActionPayload) -> Result<(), ActionError> {
        tracing::info!(label = %self.label, output = %output, "Action applied");
        Ok(())
    }

    fn tick(&self) -> Result<(), ActionError> {
        std::thread::sleep(self.idle_tick);
        Ok(())
    }
}
