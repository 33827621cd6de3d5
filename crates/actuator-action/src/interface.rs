//! Interface descriptors: the declared shape of each action's input.
//!
//! Each kind knows how to build its typed payload from a raw command value
//! and how to describe itself to the planner.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ActionError, RegistryError};
use crate::types::{ActionPayload, Emotion, Movement};

/// The interface kinds an action can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionInterface {
    Move,
    Speak,
    Emotion,
}

impl ActionInterface {
    /// Build the typed input for this interface from a raw command value.
    pub fn parse(&self, raw: &serde_json::Value) -> Result<ActionPayload, ActionError> {
        let text = raw.as_str().ok_or_else(|| {
            ActionError::InvalidInput(format!("{} expects a string argument, got {}", self, raw))
        })?;

        match self {
            ActionInterface::Move => text
                .parse::<Movement>()
                .map(ActionPayload::Move)
                .map_err(ActionError::InvalidInput),
            ActionInterface::Emotion => text
                .parse::<Emotion>()
                .map(ActionPayload::Emotion)
                .map_err(ActionError::InvalidInput),
            ActionInterface::Speak => {
                if text.is_empty() {
                    return Err(ActionError::InvalidInput(
                        "Speech text must not be empty".to_string(),
                    ));
                }
                Ok(ActionPayload::Speak(text.to_string()))
            }
        }
    }

    /// One-paragraph summary of the effect, shown to the planner.
    pub fn doc(&self) -> &'static str {
        match self {
            ActionInterface::Move => {
                "A movement to be performed by the agent.\nEffect: Allows the agent to move."
            }
            ActionInterface::Speak => {
                "Words to be spoken by the agent.\nEffect: Allows the agent to speak."
            }
            ActionInterface::Emotion => {
                "An emotion to be performed by the agent.\nEffect: Allows the agent to express emotions."
            }
        }
    }

    /// Argument hint listing the accepted values.
    pub fn argument_hint(&self) -> String {
        match self {
            ActionInterface::Move => allowed(Movement::ALL.iter()),
            ActionInterface::Emotion => allowed(Emotion::ALL.iter()),
            ActionInterface::Speak => "Free text to say out loud".to_string(),
        }
    }

    /// Planner-facing description of an action using this interface.
    pub fn describe(&self, label: &str) -> String {
        format!(
            "command: {}\n{}\n    Arguments: {}",
            label,
            self.doc(),
            self.argument_hint()
        )
    }
}

fn allowed<T: fmt::Display>(values: impl Iterator<Item = T>) -> String {
    let quoted: Vec<String> = values.map(|v| format!("'{}'", v)).collect();
    format!("Allowed values: {}", quoted.join(", "))
}

impl fmt::Display for ActionInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionInterface::Move => write!(f, "move"),
            ActionInterface::Speak => write!(f, "speak"),
            ActionInterface::Emotion => write!(f, "emotion"),
        }
    }
}

impl std::str::FromStr for ActionInterface {
    type Err = RegistryError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "move" => Ok(ActionInterface::Move),
            "speak" => Ok(ActionInterface::Speak),
            "emotion" => Ok(ActionInterface::Emotion),
            _ => Err(RegistryError::UnknownInterface(s.to_string())),
        }
    }
}
