//! Infrastructure Layer
//!
//! - **Docker**: container platform driven through the docker CLI
//! - **In-memory**: platform double for tests
//! - **Config**: environment settings

pub mod config;
pub mod docker;
pub mod in_memory;

pub use docker::DockerPlatform;
pub use in_memory::InMemoryPlatform;
