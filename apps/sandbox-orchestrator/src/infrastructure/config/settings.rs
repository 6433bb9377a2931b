//! Orchestrator Configuration Settings
//!
//! Loaded from environment variables; CLI flags are applied on top by the
//! binary.

use std::path::PathBuf;
use std::time::Duration;

use crate::domain::{EgressPolicy, LaunchSettings, MarketFeed, ResourceLimits};

/// Complete orchestrator configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Directory holding one subdirectory per strategy.
    pub strategies_dir: PathBuf,
    /// Gateway URL injected into every sandbox.
    pub desk_server_url: String,
    /// Strategy runtime image.
    pub image: String,
    /// Internal network shared with the gateway.
    pub network: String,
    /// Gateway container attached to the internal network.
    pub gateway_container: String,
    /// Market data feed URL.
    pub market_data_url: String,
    /// Image of the per-sandbox feed relay.
    pub feed_image: String,
    /// Network the feed relay reaches the market data feed on.
    pub feed_network: String,
    /// Default per-sandbox ceiling.
    pub resources: ResourceLimits,
    /// Docker binary.
    pub docker_bin: String,
    /// Pause between stop and start on restart.
    pub restart_settle: Duration,
}

impl OrchestratorConfig {
    /// Default strategies root.
    pub const DEFAULT_STRATEGIES_DIR: &'static str = "./strategies";
    /// Default gateway URL as seen from the sandbox network.
    pub const DEFAULT_DESK_SERVER_URL: &'static str = "http://order-gateway:8080";
    /// Default strategy image.
    pub const DEFAULT_IMAGE: &'static str = "trading-desk-strategy";
    /// Default sandbox network.
    pub const DEFAULT_NETWORK: &'static str = "trading-desk-network";
    /// Default gateway container name.
    pub const DEFAULT_GATEWAY_CONTAINER: &'static str = "order-gateway";
    /// Default market data feed.
    pub const DEFAULT_MARKET_DATA_URL: &'static str = "http://market-data:8090/stream";
    /// Default feed relay image.
    pub const DEFAULT_FEED_IMAGE: &'static str = "curlimages/curl";
    /// Default feed relay network.
    pub const DEFAULT_FEED_NETWORK: &'static str = "bridge";
    /// Default CPU ceiling.
    pub const DEFAULT_CPUS: &'static str = "0.5";
    /// Default memory ceiling.
    pub const DEFAULT_MEMORY: &'static str = "256m";
    /// Default docker binary.
    pub const DEFAULT_DOCKER_BIN: &'static str = "docker";
    /// Default restart settle delay.
    pub const DEFAULT_RESTART_SETTLE: Duration = Duration::from_secs(1);

    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a resource ceiling is malformed or the feed relay
    /// network is the sandbox network.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from any key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if `SANDBOX_CPUS` or `SANDBOX_MEMORY` is malformed, or
    /// if the feed relay would share the sandbox network.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let cpus = get("SANDBOX_CPUS", Self::DEFAULT_CPUS);
        let cpus = ResourceLimits::parse_cpus(&cpus).ok_or_else(|| ConfigError::Invalid {
            key: "SANDBOX_CPUS".to_string(),
            value: cpus.clone(),
        })?;
        let memory = get("SANDBOX_MEMORY", Self::DEFAULT_MEMORY);
        let memory = ResourceLimits::parse_memory(&memory).ok_or_else(|| ConfigError::Invalid {
            key: "SANDBOX_MEMORY".to_string(),
            value: memory.clone(),
        })?;

        let network = get("SANDBOX_NETWORK", Self::DEFAULT_NETWORK);
        let feed_network = get("FEED_NETWORK", Self::DEFAULT_FEED_NETWORK);
        if feed_network == network {
            return Err(ConfigError::Invalid {
                key: "FEED_NETWORK".to_string(),
                value: feed_network,
            });
        }

        let restart_settle = lookup("RESTART_SETTLE_MS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map_or(Self::DEFAULT_RESTART_SETTLE, Duration::from_millis);

        Ok(Self {
            strategies_dir: PathBuf::from(get("STRATEGIES_DIR", Self::DEFAULT_STRATEGIES_DIR)),
            desk_server_url: get("DESK_SERVER_URL", Self::DEFAULT_DESK_SERVER_URL),
            image: get("SANDBOX_IMAGE", Self::DEFAULT_IMAGE),
            network,
            gateway_container: get("GATEWAY_CONTAINER", Self::DEFAULT_GATEWAY_CONTAINER),
            market_data_url: get("MARKET_DATA_URL", Self::DEFAULT_MARKET_DATA_URL),
            feed_image: get("FEED_IMAGE", Self::DEFAULT_FEED_IMAGE),
            feed_network,
            resources: ResourceLimits { cpus, memory },
            docker_bin: get("DOCKER_BIN", Self::DEFAULT_DOCKER_BIN),
            restart_settle,
        })
    }

    /// Launch parameters shared by every sandbox.
    #[must_use]
    pub fn launch_settings(&self) -> LaunchSettings {
        LaunchSettings {
            image: self.image.clone(),
            egress: EgressPolicy {
                network: self.network.clone(),
                gateway_container: self.gateway_container.clone(),
                gateway_url: self.desk_server_url.clone(),
            },
            feed: MarketFeed {
                url: self.market_data_url.clone(),
                image: self.feed_image.clone(),
                network: self.feed_network.clone(),
            },
            default_resources: self.resources.clone(),
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Value present but unusable.
    #[error("invalid value for {key}: '{value}'")]
    Invalid {
        /// Environment variable.
        key: String,
        /// Offending value.
        value: String,
    },
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply() {
        let config = OrchestratorConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.strategies_dir, PathBuf::from("./strategies"));
        assert_eq!(config.desk_server_url, "http://order-gateway:8080");
        assert_eq!(config.image, "trading-desk-strategy");
        assert_eq!(config.network, "trading-desk-network");
        assert_eq!(config.gateway_container, "order-gateway");
        assert_eq!(config.feed_network, "bridge");
        assert_eq!(config.resources.cpus, "0.5");
        assert_eq!(config.resources.memory, "256m");
        assert_eq!(config.docker_bin, "docker");
        assert_eq!(config.restart_settle, Duration::from_secs(1));
    }

    #[test]
    fn overrides_apply() {
        let config = OrchestratorConfig::from_lookup(lookup(&[
            ("STRATEGIES_DIR", "/srv/strategies"),
            ("DESK_SERVER_URL", "http://gw:9000"),
            ("SANDBOX_NETWORK", "desk-internal"),
            ("GATEWAY_CONTAINER", "desk-gateway"),
            ("MARKET_DATA_URL", "http://10.0.0.5:8090/stream"),
            ("SANDBOX_CPUS", "1"),
            ("SANDBOX_MEMORY", "1G"),
            ("RESTART_SETTLE_MS", "0"),
        ]))
        .unwrap();

        assert_eq!(config.strategies_dir, PathBuf::from("/srv/strategies"));
        assert_eq!(config.resources.memory, "1g");
        assert_eq!(config.restart_settle, Duration::ZERO);

        let settings = config.launch_settings();
        assert_eq!(settings.egress.network, "desk-internal");
        assert_eq!(settings.egress.gateway_url, "http://gw:9000");
        assert_eq!(settings.egress.gateway_container, "desk-gateway");
        assert_eq!(settings.feed.url, "http://10.0.0.5:8090/stream");
        assert_eq!(settings.feed.network, "bridge");
    }

    #[test]
    fn blank_values_fall_back() {
        let config = OrchestratorConfig::from_lookup(lookup(&[("SANDBOX_IMAGE", "  ")])).unwrap();
        assert_eq!(config.image, "trading-desk-strategy");
    }

    #[test]
    fn malformed_ceiling_is_an_error() {
        let err = OrchestratorConfig::from_lookup(lookup(&[("SANDBOX_MEMORY", "plenty")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key, .. } if key == "SANDBOX_MEMORY"));
    }

    #[test]
    fn feed_relay_cannot_share_the_sandbox_network() {
        let err = OrchestratorConfig::from_lookup(lookup(&[
            ("SANDBOX_NETWORK", "desk-internal"),
            ("FEED_NETWORK", "desk-internal"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key, .. } if key == "FEED_NETWORK"));
    }
}
