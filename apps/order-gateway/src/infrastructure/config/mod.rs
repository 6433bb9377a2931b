//! Configuration Module
//!
//! Configuration loading for the gateway binary.

mod settings;

pub use settings::{ConfigError, Credentials, GatewayConfig};
