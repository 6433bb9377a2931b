// Allow unwrap/expect in tests - tests should panic on unexpected errors
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::redundant_closure_for_method_calls
    )
)]

//! Sandbox Orchestrator
//!
//! Starts, stops and inspects strategy sandboxes: containers that can reach
//! only the order gateway, with capped CPU and memory and a read-only code
//! mount. State is never cached; every operation asks the platform.
//!
//! # Architecture (Hexagonal)
//!
//! - **Domain**: `SandboxId`, `SandboxSpec`, `StrategyConfig`, no I/O
//! - **Application**: `SandboxRegistry`, `Orchestrator`, `SandboxPlatform` port
//! - **Infrastructure**: `DockerPlatform`, `InMemoryPlatform`, environment config

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

/// Domain layer - Identity, launch spec, config resolution.
pub mod domain;

/// Application layer - Orchestration and the platform port.
pub mod application;

/// Infrastructure layer - Platforms and configuration.
pub mod infrastructure;

pub use application::{
    Action, InstanceReport, Logs, Orchestrator, OrchestratorError, OrchestratorWarning, Outcome,
    SandboxRegistry,
};
pub use domain::{SandboxId, SandboxStatus, StrategyConfig};
