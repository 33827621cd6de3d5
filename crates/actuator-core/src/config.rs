use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ActuatorError, Result};

/// Placeholder robot id meaning "resolve from the `URID` environment variable".
pub const DEFAULT_URID: &str = "default";

/// Top-level configuration for the actuator runtime.
///
/// Loaded from `~/.actuator/config.toml` by default. The `[[actions]]` array
/// describes the registry that is built once at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    #[serde(default)]
    pub actions: Vec<ActionSpec>,
}

impl RuntimeConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: RuntimeConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Reject values the runtime cannot operate with.
    pub fn validate(&self) -> Result<()> {
        if !(self.general.hertz > 0.0 && self.general.hertz.is_finite()) {
            return Err(ActuatorError::Config(format!(
                "general.hertz must be positive, got {}",
                self.general.hertz
            )));
        }
        for spec in &self.actions {
            if spec.label.trim().is_empty() {
                return Err(ActuatorError::Config(format!(
                    "action '{}' has an empty label",
                    spec.name
                )));
            }
        }
        Ok(())
    }

    /// Robot id after applying the `URID` environment fallback.
    ///
    /// Logs when the id is left at its placeholder, so resolve once per start.
    pub fn resolve_urid(&self) -> String {
        resolve_urid_with(&self.general.urid, std::env::var("URID").ok())
    }

    /// Action specs with `urid` injected into each option table.
    ///
    /// An action that sets its own `urid` keeps it.
    pub fn resolved_actions(&self, urid: &str) -> Vec<ActionSpec> {
        self.actions
            .iter()
            .cloned()
            .map(|mut spec| {
                if !spec.config.contains_key("urid") {
                    spec.config
                        .insert("urid".to_string(), toml::Value::String(urid.to_string()));
                }
                spec
            })
            .collect()
    }
}

fn resolve_urid_with(configured: &str, env_urid: Option<String>) -> String {
    if configured.is_empty() {
        warn!("No URID configured. Multirobot deployments will conflict.");
        return DEFAULT_URID.to_string();
    }
    if configured != DEFAULT_URID {
        return configured.to_string();
    }
    match env_urid.filter(|u| !u.is_empty()) {
        Some(urid) => {
            info!("Using URID from environment");
            urid
        }
        None => {
            warn!("URID is 'default' and no URID env var is set. Multirobot deployments will conflict.");
            DEFAULT_URID.to_string()
        }
    }
}

/// General runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Agent name, used in logs.
    pub name: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// Planning cycles (and promise flushes) per second.
    pub hertz: f64,
    /// Robot id used to derive transport topics.
    pub urid: String,
    /// Treat duplicate action labels as a hard configuration error.
    pub strict_labels: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            name: "actuator".to_string(),
            log_level: "info".to_string(),
            hertz: 1.0,
            urid: DEFAULT_URID.to_string(),
            strict_labels: false,
        }
    }
}

/// Worker loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Sleep used by implementations and connectors that have no tick work.
    pub idle_tick_ms: u64,
    /// How long shutdown waits for worker threads to exit.
    pub shutdown_timeout_ms: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            idle_tick_ms: 1_000,
            shutdown_timeout_ms: 5_000,
        }
    }
}

/// One `[[actions]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSpec {
    /// Interface kind: "move", "speak", "emotion".
    pub name: String,
    /// Label the planner uses in `Command::kind`.
    pub label: String,
    /// Implementation variant, e.g. "passthrough".
    #[serde(default = "default_implementation")]
    pub implementation: String,
    /// Connector variant, e.g. "log", "bus", "twist".
    #[serde(default = "default_connector")]
    pub connector: String,
    /// Free-form options handed to the implementation and connector.
    #[serde(default)]
    pub config: toml::Table,
}

fn default_implementation() -> String {
    "passthrough".to_string()
}

fn default_connector() -> String {
    "log".to_string()
}
