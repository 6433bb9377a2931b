//! Application Layer
//!
//! - `ports`: the sandbox platform port
//! - `registry`: strategy discovery, identity and config resolution
//! - `orchestrator`: lifecycle operations and batch reporting

pub mod orchestrator;
pub mod ports;
pub mod registry;

pub use orchestrator::{
    Action, InstanceReport, Logs, Orchestrator, OrchestratorError, OrchestratorWarning, Outcome,
};
pub use ports::{LogOptions, LogStream, PlatformError, SandboxPlatform};
pub use registry::SandboxRegistry;
