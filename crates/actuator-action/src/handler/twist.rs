//! Twist connector: turns movements into velocity commands.
//!
//! Publishes a `Twist` on `<urid>/c3/cmd_vel`. While a non-zero command is
//! still executing, newer movements are discarded until the command
//! timeout elapses.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::bus::ActionBus;
use crate::error::{ActionError, RegistryError};
use crate::handler::{urid_option, ActionConnector, BuildContext};
use crate::types::{ActionOptions, ActionPayload, Movement};

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(2);
const TICK_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Linear and angular velocity, ROS `geometry_msgs/Twist` layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Twist {
    pub linear: Vector3,
    pub angular: Vector3,
}

impl Twist {
    pub fn planar(linear: f64, angular: f64) -> Self {
        Self {
            linear: Vector3 {
                x: linear,
                ..Vector3::default()
            },
            angular: Vector3 {
                z: angular,
                ..Vector3::default()
            },
        }
    }

    pub fn is_zero(&self) -> bool {
        self.linear.x == 0.0 && self.angular.z == 0.0
    }
}

/// Velocity for a movement; `None` means publish nothing.
pub fn twist_for(movement: Movement) -> Option<Twist> {
    match movement {
        Movement::TurnLeft => Some(Twist::planar(0.3, 0.3)),
        Movement::TurnRight => Some(Twist::planar(0.3, -0.3)),
        Movement::MoveForwards => Some(Twist::planar(0.5, 0.0)),
        Movement::MoveBack => Some(Twist::planar(-0.5, 0.0)),
        Movement::StandStill | Movement::AvoidLeftObstacle | Movement::AvoidRightObstacle => None,
    }
}

#[derive(Debug, Default)]
struct MotionState {
    executing_since: Option<Instant>,
}

pub struct TwistConnector {
    bus: ActionBus,
    topic: String,
    command_timeout: Duration,
    state: Mutex<MotionState>,
}

impl TwistConnector {
    pub fn new(bus: ActionBus, topic: impl Into<String>, command_timeout: Duration) -> Self {
        Self {
            bus,
            topic: topic.into(),
            command_timeout,
            state: Mutex::new(MotionState::default()),
        }
    }

    pub fn from_options(options: &ActionOptions, ctx: &BuildContext) -> Result<Self, RegistryError> {
        let topic = match options.str("topic")? {
            Some(topic) => topic.to_string(),
            None => format!("{}/c3/cmd_vel", urid_option(options)?),
        };
        let timeout = options
            .millis("command_timeout_ms")?
            .unwrap_or(DEFAULT_COMMAND_TIMEOUT);
        Ok(Self::new(ctx.bus.clone(), topic, timeout))
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    fn publish(&self, twist: Twist) -> Result<(), ActionError> {
        let payload =
            serde_json::to_value(twist).map_err(|e| ActionError::ConnectFailed(e.to_string()))?;
        self.bus.publish(self.topic.clone(), payload);
        Ok(())
    }
}

#[async_trait]
impl ActionConnector for TwistConnector {
    async fn connect(&self, output: ActionPayload) -> Result<(), ActionError> {
        let movement = match output {
            ActionPayload::Move(m) => m,
            other => {
                return Err(ActionError::ConnectFailed(format!(
                    "twist connector only accepts movements, got {}",
                    other
                )))
            }
        };

        let mut state = self
            .state
            .lock()
            .map_err(|e| ActionError::ConnectFailed(format!("Lock poisoned: {}", e)))?;

        if let Some(since) = state.executing_since {
            if since.elapsed() < self.command_timeout {
                tracing::debug!(movement = %movement, "Discarding movement, previous command still executing");
                return Ok(());
            }
            tracing::debug!(movement = %movement, "Previous command timed out");
            state.executing_since = None;
        }

        let Some(twist) = twist_for(movement) else {
            tracing::info!(movement = %movement, "No velocity published");
            return Ok(());
        };

        tracing::info!(
            movement = %movement,
            linear = twist.linear.x,
            angular = twist.angular.z,
            topic = %self.topic,
            "Publishing twist"
        );
        self.publish(twist)?;
        state.executing_since = if twist.is_zero() {
            None
        } else {
            Some(Instant::now())
        };
        Ok(())
    }

    fn tick(&self) -> Result<(), ActionError> {
        std::thread::sleep(TICK_INTERVAL);
        Ok(())
    }
}
