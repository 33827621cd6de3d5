pub mod config;
pub mod error;
pub mod types;

pub use config::RuntimeConfig;
pub use error::{ActuatorError, Result};
pub use types::*;
