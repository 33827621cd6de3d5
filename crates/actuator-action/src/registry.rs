//! Action registry.
//!
//! A static collection of actions built once at startup, looked up by the
//! label the planner uses.

use std::collections::HashSet;
use std::sync::Arc;

use actuator_core::config::ActionSpec;

use crate::error::RegistryError;
use crate::handler::{build_action, AgentAction, BuildContext};

/// Ordered collection of registered actions.
///
/// Labels are expected to be unique. When they are not, lookup returns the
/// first registered action with that label.
#[derive(Debug, Default)]
pub struct ActionRegistry {
    actions: Vec<Arc<AgentAction>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every configured action.
    ///
    /// Duplicate labels are logged and kept (first match wins) unless
    /// `strict_labels` is set, in which case they are an error.
    pub fn from_specs(
        specs: &[ActionSpec],
        ctx: &BuildContext,
        strict_labels: bool,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        let mut seen = HashSet::new();
        for spec in specs {
            if !seen.insert(spec.label.as_str()) {
                if strict_labels {
                    return Err(RegistryError::DuplicateLabel(spec.label.clone()));
                }
                tracing::warn!(
                    label = %spec.label,
                    name = %spec.name,
                    "Duplicate action label; the first registration wins"
                );
            }
            let action = build_action(spec, ctx)?;
            tracing::info!(
                label = %action.label,
                implementation = %spec.implementation,
                connector = %spec.connector,
                "Action registered"
            );
            registry.register(action);
        }
        Ok(registry)
    }

    /// Append an action.
    pub fn register(&mut self, action: AgentAction) {
        self.actions.push(Arc::new(action));
    }

    /// Exact-match lookup by label.
    pub fn get(&self, label: &str) -> Option<Arc<AgentAction>> {
        self.actions.iter().find(|a| a.label == label).cloned()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.actions.iter().any(|a| a.label == label)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<AgentAction>> {
        self.actions.iter()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.actions.iter().map(|a| a.label.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Planner-facing descriptions of every action, one block per action.
    pub fn describe_all(&self) -> String {
        self.actions
            .iter()
            .map(|a| a.describe())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
