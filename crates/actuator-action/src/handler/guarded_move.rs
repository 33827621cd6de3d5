//! Guarded move implementation.
//!
//! The worker loop's `tick()` drains hazard reports from the bus and
//! publishes the latest snapshot through a `watch` channel. `execute()` reads
//! that snapshot and rejects movements heading into a reported obstacle.
//! The two sides never share a mutable field; the channel is the boundary.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::{broadcast, watch};

use crate::bus::{ActionBus, BusMessage};
use crate::error::{ActionError, RegistryError};
use crate::handler::{urid_option, ActionImplementation, BuildContext};
use crate::interface::ActionInterface;
use crate::types::{ActionOptions, ActionPayload, Movement};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Latest obstacle report around the robot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hazards {
    pub front: bool,
    pub back: bool,
    pub left: bool,
    pub right: bool,
}

impl Hazards {
    /// The blocked side a movement would head into, if any.
    pub fn blocking(&self, movement: Movement) -> Option<&'static str> {
        let (blocked, side) = match movement {
            Movement::MoveForwards => (self.front, "front"),
            Movement::MoveBack => (self.back, "back"),
            Movement::TurnLeft | Movement::AvoidRightObstacle => (self.left, "left"),
            Movement::TurnRight | Movement::AvoidLeftObstacle => (self.right, "right"),
            Movement::StandStill => (false, ""),
        };
        blocked.then_some(side)
    }
}

pub struct GuardedMoveImplementation {
    reports: Mutex<broadcast::Receiver<BusMessage>>,
    hazard_topic: String,
    latest: watch::Sender<Hazards>,
    poll_interval: Duration,
}

impl GuardedMoveImplementation {
    pub fn new(bus: &ActionBus, hazard_topic: impl Into<String>, poll_interval: Duration) -> Self {
        let (latest, _) = watch::channel(Hazards::default());
        Self {
            reports: Mutex::new(bus.subscribe()),
            hazard_topic: hazard_topic.into(),
            latest,
            poll_interval,
        }
    }

    /// Options: `hazard_topic` (default `<urid>/hazards`), `poll_interval_ms`.
    pub fn from_options(options: &ActionOptions, ctx: &BuildContext) -> Result<Self, RegistryError> {
        let topic = match options.str("hazard_topic")? {
            Some(topic) => topic.to_string(),
            None => format!("{}/hazards", urid_option(options)?),
        };
        let poll = options
            .millis("poll_interval_ms")?
            .unwrap_or(DEFAULT_POLL_INTERVAL);
        Ok(Self::new(&ctx.bus, topic, poll))
    }

    pub fn hazard_topic(&self) -> &str {
        &self.hazard_topic
    }

    /// Observe snapshot updates.
    pub fn subscribe(&self) -> watch::Receiver<Hazards> {
        self.latest.subscribe()
    }

    pub fn current(&self) -> Hazards {
        *self.latest.borrow()
    }

    fn drain_reports(&self) -> Result<(), ActionError> {
        let mut reports = self
            .reports
            .lock()
            .map_err(|e| ActionError::TickFailed(format!("Lock poisoned: {}", e)))?;

        loop {
            match reports.try_recv() {
                Ok(msg) if msg.topic == self.hazard_topic => {
                    let hazards: Hazards = serde_json::from_value(msg.payload).map_err(|e| {
                        ActionError::TickFailed(format!("Malformed hazard report: {}", e))
                    })?;
                    self.latest.send_replace(hazards);
                }
                Ok(_) => {}
                Err(TryRecvError::Empty) => return Ok(()),
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Hazard reports dropped, reader lagging");
                }
                Err(TryRecvError::Closed) => {
                    return Err(ActionError::TickFailed("Action bus closed".to_string()))
                }
            }
        }
    }
}

#[async_trait]
impl ActionImplementation for GuardedMoveImplementation {
    fn make_input(&self, raw: &serde_json::Value) -> Result<ActionPayload, ActionError> {
        ActionInterface::Move.parse(raw)
    }

    async fn execute(&self, input: ActionPayload) -> Result<ActionPayload, ActionError> {
        let movement = match input {
            ActionPayload::Move(m) => m,
            other => {
                return Err(ActionError::InvalidInput(format!(
                    "guarded move expects a movement, got {}",
                    other
                )))
            }
        };

        if let Some(side) = self.current().blocking(movement) {
            return Err(ActionError::Rejected(format!(
                "{} blocked by {} obstacle",
                movement, side
            )));
        }
        Ok(ActionPayload::Move(movement))
    }

    fn tick(&self) -> Result<(), ActionError> {
        let drained = self.drain_reports();
        std::thread::sleep(self.poll_interval);
        drained
    }
}
