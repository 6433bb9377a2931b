//! Application ports.

mod platform_port;

#[cfg(test)]
pub use platform_port::MockSandboxPlatform;
pub use platform_port::{LogOptions, LogStream, PlatformError, SandboxPlatform};
