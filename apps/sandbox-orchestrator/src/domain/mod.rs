//! Domain Layer
//!
//! Sandbox identity, launch specification and strategy config resolution.
//! No I/O.

pub mod config;
pub mod sandbox;

pub use config::{CONFIG_FILE, StrategyConfig};
pub use sandbox::{
    ENTRY_FILE, EgressPolicy, LaunchSettings, MarketFeed, ObservedState, RESERVED_ENV,
    ResourceLimits, SandboxId, SandboxSpec, SandboxStatus, base_name,
};
