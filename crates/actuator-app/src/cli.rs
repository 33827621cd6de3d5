//! CLI argument definitions for the actuator binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Actuator: dispatches planner commands to pluggable robot actions.
#[derive(Parser, Debug)]
#[command(name = "actuator", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum CliCommand {
    /// Read planner cycles as JSON lines on stdin and dispatch them.
    Run {
        /// Flush cadence in cycles per second. Overrides `general.hertz`.
        #[arg(long = "hertz")]
        hertz: Option<f64>,
    },
    /// Print the planner description of every configured action.
    Describe,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > ACTUATOR_CONFIG env var > ~/.actuator/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("ACTUATOR_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Whether the config path was named by flag or env var rather than
    /// falling through to the default location.
    pub fn config_is_explicit(&self) -> bool {
        self.config.is_some() || std::env::var_os("ACTUATOR_CONFIG").is_some()
    }

    /// Resolve the log filter directive used when `RUST_LOG` is unset.
    ///
    /// Priority: --log-level flag > config file value > "info".
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        if let Some(ref level) = self.log_level {
            return level.clone();
        }
        if !config_level.trim().is_empty() {
            return config_level.to_string();
        }
        "info".to_string()
    }

    /// Resolve the flush cadence.
    ///
    /// Priority: --hertz flag > config file value. Non-positive overrides
    /// are ignored.
    pub fn resolve_hertz(&self, config_hertz: f64) -> f64 {
        match self.command {
            CliCommand::Run { hertz: Some(h) } if h.is_finite() && h > 0.0 => h,
            _ => config_hertz,
        }
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".actuator").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".actuator").join("config.toml");
    }
    PathBuf::from("config.toml")
}
