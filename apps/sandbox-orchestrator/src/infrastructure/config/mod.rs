//! Configuration infrastructure.

mod settings;

pub use settings::{ConfigError, OrchestratorConfig};
