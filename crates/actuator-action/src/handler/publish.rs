//! Bus connector.
//!
//! Publishes each output on the action bus under a fixed topic, e.g. the
//! speech topic a speaker process listens on.

use std::time::Duration;

use async_trait::async_trait;

use crate::bus::ActionBus;
use crate::error::{ActionError, RegistryError};
use crate::handler::{urid_option, ActionConnector, BuildContext};
use crate::types::{ActionOptions, ActionPayload};

pub struct BusConnector {
    bus: ActionBus,
    topic: String,
    idle_tick: Duration,
}

impl BusConnector {
    pub fn new(bus: ActionBus, topic: impl Into<String>, idle_tick: Duration) -> Self {
        Self {
            bus,
            topic: topic.into(),
            idle_tick,
        }
    }

    /// Topic from the `topic` option, else `<urid>/<label>`.
    pub fn from_options(
        label: &str,
        options: &ActionOptions,
        ctx: &BuildContext,
    ) -> Result<Self, RegistryError> {
        let topic = match options.str("topic")? {
            Some(topic) => topic.to_string(),
            None => format!("{}/{}", urid_option(options)?, label),
        };
        Ok(Self::new(ctx.bus.clone(), topic, ctx.idle_tick))
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[async_trait]
impl ActionConnector for BusConnector {
    async fn connect(&self, output: ActionPayload) -> Result<(), ActionError> {
        let payload = match &output {
            ActionPayload::Speak(text) => serde_json::Value::String(text.clone()),
            other => serde_json::to_value(other)
                .map_err(|e| ActionError::ConnectFailed(e.to_string()))?,
        };
        let receivers = self.bus.publish(self.topic.clone(), payload);
        tracing::debug!(topic = %self.topic, receivers, "Published action output");
        Ok(())
    }

    fn tick(&self) -> Result<(), ActionError> {
        std::thread::sleep(self.idle_tick);
        Ok(())
    }
}
