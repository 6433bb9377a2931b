//! Sandbox Platform Port
//!
//! Abstraction over whatever runs isolated execution units: a container
//! engine in production, an in-memory table in tests. The contract every
//! implementation preserves is the one carried by [`SandboxSpec`]: network
//! confined to the gateway, bounded CPU and memory, read-only code mount.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::domain::{EgressPolicy, ObservedState, SandboxId, SandboxSpec};

/// Output lines of a sandbox.
pub type LogStream = BoxStream<'static, Result<String, PlatformError>>;

/// How much output to stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogOptions {
    /// Number of trailing lines to start from.
    pub tail: usize,
    /// Keep streaming new output until the sandbox exits.
    pub follow: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            tail: 100,
            follow: false,
        }
    }
}

/// Errors from the execution platform.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    /// Platform tool could not be started.
    #[error("failed to run {command}: {source}")]
    Spawn {
        /// Command that failed to start.
        command: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Platform tool ran and reported failure.
    #[error("{command} exited with {code:?}: {stderr}")]
    CommandFailed {
        /// Command that failed.
        command: String,
        /// Exit code, if the process exited normally.
        code: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },

    /// Platform output could not be understood.
    #[error("unexpected platform output: {0}")]
    Parse(String),

    /// Platform refused the operation.
    #[error("platform unavailable: {0}")]
    Unavailable(String),
}

/// Port for the sandbox execution platform.
///
/// Implementations hold no desired-state bookkeeping: `observe` always
/// reports what the platform has right now.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SandboxPlatform: Send + Sync {
    /// Current state of the instance with this identity.
    async fn observe(&self, id: &SandboxId) -> Result<ObservedState, PlatformError>;

    /// Create the confined network if it does not exist and attach the
    /// gateway to it.
    async fn ensure_network(&self, egress: &EgressPolicy) -> Result<(), PlatformError>;

    /// Create and start an instance, with the market data relay feeding its
    /// stdin from outside the confined network.
    async fn launch(&self, spec: &SandboxSpec) -> Result<(), PlatformError>;

    /// Kill and delete an instance and its feed relay. Removing an absent
    /// instance succeeds.
    async fn remove(&self, id: &SandboxId) -> Result<(), PlatformError>;

    /// Stream the instance's output.
    async fn logs(&self, id: &SandboxId, options: LogOptions) -> Result<LogStream, PlatformError>;
}
