//! Docker container platform.

mod platform;

pub use platform::{
    DockerPlatform, FEED_ENTRYPOINT, FEED_MOUNT, STRATEGY_ENTRYPOINT, STRATEGY_MOUNT, feed_args,
    feed_name, parse_state, run_args,
};
