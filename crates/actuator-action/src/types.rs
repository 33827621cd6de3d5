//! Core types and value objects for the action runtime.
//!
//! Defines the typed payloads actions exchange, promise status, and the
//! option table handed to implementations and connectors.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::RegistryError;

// =============================================================================
// Enums
// =============================================================================

/// Movement vocabulary understood by the move interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Movement {
    #[serde(rename = "turn left")]
    TurnLeft,
    #[serde(rename = "turn right")]
    TurnRight,
    #[serde(rename = "move forwards")]
    MoveForwards,
    #[serde(rename = "move back")]
    MoveBack,
    #[serde(rename = "avoid left obstacle")]
    AvoidLeftObstacle,
    #[serde(rename = "avoid right obstacle")]
    AvoidRightObstacle,
    #[serde(rename = "stand still")]
    StandStill,
}

impl Movement {
    pub const ALL: [Movement; 7] = [
        Movement::TurnLeft,
        Movement::TurnRight,
        Movement::MoveForwards,
        Movement::MoveBack,
        Movement::AvoidLeftObstacle,
        Movement::AvoidRightObstacle,
        Movement::StandStill,
    ];
}

impl fmt::Display for Movement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Movement::TurnLeft => write!(f, "turn left"),
            Movement::TurnRight => write!(f, "turn right"),
            Movement::MoveForwards => write!(f, "move forwards"),
            Movement::MoveBack => write!(f, "move back"),
            Movement::AvoidLeftObstacle => write!(f, "avoid left obstacle"),
            Movement::AvoidRightObstacle => write!(f, "avoid right obstacle"),
            Movement::StandStill => write!(f, "stand still"),
        }
    }
}

impl std::str::FromStr for Movement {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "turn left" => Ok(Movement::TurnLeft),
            "turn right" => Ok(Movement::TurnRight),
            "move forwards" => Ok(Movement::MoveForwards),
            "move back" => Ok(Movement::MoveBack),
            "avoid left obstacle" => Ok(Movement::AvoidLeftObstacle),
            "avoid right obstacle" => Ok(Movement::AvoidRightObstacle),
            "stand still" => Ok(Movement::StandStill),
            _ => Err(format!("Unknown movement: {}", s)),
        }
    }
}

/// Emotions the agent can express.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Emotion {
    Happy,
    Sad,
    Mad,
    Curious,
}

impl Emotion {
    pub const ALL: [Emotion; 4] = [Emotion::Happy, Emotion::Sad, Emotion::Mad, Emotion::Curious];
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Emotion::Happy => write!(f, "happy"),
            Emotion::Sad => write!(f, "sad"),
            Emotion::Mad => write!(f, "mad"),
            Emotion::Curious => write!(f, "curious"),
        }
    }
}

impl std::str::FromStr for Emotion {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "happy" => Ok(Emotion::Happy),
            "sad" => Ok(Emotion::Sad),
            "mad" => Ok(Emotion::Mad),
            "curious" => Ok(Emotion::Curious),
            _ => Err(format!("Unknown emotion: {}", s)),
        }
    }
}

/// Lifecycle of a dispatched command.
///
/// Pending -> Succeeded | Failed. Both outcomes are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromiseStatus {
    Pending,
    Succeeded,
    Failed,
}

impl fmt::Display for PromiseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromiseStatus::Pending => write!(f, "pending"),
            PromiseStatus::Succeeded => write!(f, "succeeded"),
            PromiseStatus::Failed => write!(f, "failed"),
        }
    }
}

// =============================================================================
// Payloads
// =============================================================================

/// Typed input and output of an action.
///
/// Implementations receive one variant from `make_input` and return a
/// (possibly different) variant for the connector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "action", rename_all = "snake_case")]
pub enum ActionPayload {
    Move(Movement),
    Speak(String),
    Emotion(Emotion),
}

impl fmt::Display for ActionPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionPayload::Move(m) => write!(f, "move: {}", m),
            ActionPayload::Speak(text) => write!(f, "speak: {}", text),
            ActionPayload::Emotion(e) => write!(f, "emotion: {}", e),
        }
    }
}

// =============================================================================
// Options
// =============================================================================

/// Per-action option table from the `[actions.config]` section.
#[derive(Debug, Clone, Default)]
pub struct ActionOptions {
    table: toml::Table,
}

impl ActionOptions {
    pub fn new(table: toml::Table) -> Self {
        Self { table }
    }

    /// String option, or `None` if absent.
    pub fn str(&self, key: &str) -> Result<Option<&str>, RegistryError> {
        match self.table.get(key) {
            None => Ok(None),
            Some(toml::Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(invalid(key, "string", other)),
        }
    }

    /// Non-negative integer option.
    pub fn u64(&self, key: &str) -> Result<Option<u64>, RegistryError> {
        match self.table.get(key) {
            None => Ok(None),
            Some(toml::Value::Integer(v)) if *v >= 0 => Ok(Some(*v as u64)),
            Some(other) => Err(invalid(key, "non-negative integer", other)),
        }
    }

    /// Millisecond option read as a `Duration`.
    pub fn millis(&self, key: &str) -> Result<Option<Duration>, RegistryError> {
        Ok(self.u64(key)?.map(Duration::from_millis))
    }
}

fn invalid(key: &str, expected: &str, got: &toml::Value) -> RegistryError {
    RegistryError::InvalidOption {
        key: key.to_string(),
        reason: format!("expected {}, got {}", expected, got.type_str()),
    }
}
