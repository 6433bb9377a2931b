//! Sandbox identity, observed state and launch specification.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use super::config::StrategyConfig;

/// Entry file every strategy directory must contain.
pub const ENTRY_FILE: &str = "strategy.py";

/// Environment keys the orchestrator owns. Strategy config cannot override them.
pub const RESERVED_ENV: [&str; 2] = ["DESK_SERVER_URL", "USER_ID"];

const ID_PREFIX: &str = "strategy-";

/// Base name of a strategy directory.
///
/// Falls back to the whole path when it has no final component (e.g. `..`).
#[must_use]
pub fn base_name(dir: &Path) -> String {
    dir.file_name().map_or_else(
        || dir.to_string_lossy().into_owned(),
        |name| name.to_string_lossy().into_owned(),
    )
}

/// Stable identity of a sandbox, derived only from its directory name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SandboxId(String);

impl SandboxId {
    /// `strategy-<basename>`, with anything outside `[A-Za-z0-9_.-]` replaced by `-`.
    #[must_use]
    pub fn for_directory(dir: &Path) -> Self {
        let name: String = base_name(dir)
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                    c
                } else {
                    '-'
                }
            })
            .collect();
        Self(format!("{ID_PREFIX}{name}"))
    }

    /// Identity as used on the platform.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SandboxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the platform reports for an identity right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservedState {
    /// No instance with this identity exists.
    Absent,
    /// Instance exists and is running.
    Running {
        /// Platform-reported start time, when parseable.
        started_at: Option<DateTime<Utc>>,
    },
    /// Instance exists but is not running (exited, killed, created).
    Stopped {
        /// Platform status string, e.g. `exited`.
        detail: String,
    },
}

/// Operator-facing classification of an [`ObservedState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxStatus {
    /// Running.
    Running,
    /// Registered on the platform but not running.
    StoppedRegistered,
    /// Never launched, or fully removed.
    NotDeployed,
}

impl SandboxStatus {
    /// Status label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::StoppedRegistered => "stopped-but-registered",
            Self::NotDeployed => "not-deployed",
        }
    }
}

impl fmt::Display for SandboxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&ObservedState> for SandboxStatus {
    fn from(state: &ObservedState) -> Self {
        match state {
            ObservedState::Absent => Self::NotDeployed,
            ObservedState::Running { .. } => Self::Running,
            ObservedState::Stopped { .. } => Self::StoppedRegistered,
        }
    }
}

/// CPU and memory ceiling for one sandbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLimits {
    /// Fractional CPUs, e.g. `0.5`.
    pub cpus: String,
    /// Memory with unit suffix, e.g. `256m`.
    pub memory: String,
}

impl ResourceLimits {
    /// Accepts a positive decimal CPU count.
    #[must_use]
    pub fn parse_cpus(raw: &str) -> Option<String> {
        let raw = raw.trim();
        let digits_ok = !raw.is_empty()
            && raw.chars().all(|c| c.is_ascii_digit() || c == '.')
            && raw.matches('.').count() <= 1;
        let positive = raw.parse::<f64>().is_ok_and(|v| v > 0.0);
        (digits_ok && positive).then(|| raw.to_string())
    }

    /// Accepts `<digits>[b|k|m|g]`, case-insensitive, greater than zero.
    #[must_use]
    pub fn parse_memory(raw: &str) -> Option<String> {
        let raw = raw.trim().to_ascii_lowercase();
        let digits = raw.strip_suffix(['b', 'k', 'm', 'g']).unwrap_or(&raw);
        let valid = !digits.is_empty()
            && digits.chars().all(|c| c.is_ascii_digit())
            && digits.chars().any(|c| c != '0');
        valid.then_some(raw)
    }
}

/// Network confinement: the sandbox joins an internal network whose only
/// other peer is the order gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EgressPolicy {
    /// Internal network name.
    pub network: String,
    /// Gateway instance attached to that network.
    pub gateway_container: String,
    /// Gateway URL reachable on that network.
    pub gateway_url: String,
}

/// Market data relay feeding a sandbox's stdin from outside its network.
///
/// The relay runs next to the sandbox, on a network the sandbox never joins,
/// and hands the stream over through a local pipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketFeed {
    /// Stream the relay subscribes to.
    pub url: String,
    /// Relay image.
    pub image: String,
    /// Network the relay uses to reach the feed.
    pub network: String,
}

/// Deployment-wide launch parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSettings {
    /// Strategy runtime image.
    pub image: String,
    /// Network confinement.
    pub egress: EgressPolicy,
    /// Market data relay.
    pub feed: MarketFeed,
    /// Ceiling applied when the strategy does not declare its own.
    pub default_resources: ResourceLimits,
}

/// Everything the platform needs to launch one sandbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxSpec {
    /// Platform identity.
    pub id: SandboxId,
    /// Absolute strategy directory, mounted read-only.
    pub strategy_dir: PathBuf,
    /// Attributed user.
    pub user_id: String,
    /// Runtime image.
    pub image: String,
    /// Injected environment, reserved keys included.
    pub env: BTreeMap<String, String>,
    /// Network confinement.
    pub egress: EgressPolicy,
    /// Stdin relay.
    pub feed: MarketFeed,
    /// CPU and memory ceiling.
    pub resources: ResourceLimits,
}

impl SandboxSpec {
    /// Builds the launch spec for a resolved strategy.
    ///
    /// Returns the spec and the custom env keys dropped because they collide
    /// with [`RESERVED_ENV`].
    #[must_use]
    pub fn assemble(
        strategy_dir: PathBuf,
        config: &StrategyConfig,
        settings: &LaunchSettings,
    ) -> (Self, Vec<String>) {
        let mut env = BTreeMap::new();
        let mut dropped = Vec::new();
        for (key, value) in &config.env {
            if RESERVED_ENV.contains(&key.as_str()) {
                dropped.push(key.clone());
            } else {
                env.insert(key.clone(), value.clone());
            }
        }
        env.insert(
            "DESK_SERVER_URL".to_string(),
            settings.egress.gateway_url.clone(),
        );
        env.insert("USER_ID".to_string(), config.user_id.clone());

        let resources = ResourceLimits {
            cpus: config
                .cpus
                .clone()
                .unwrap_or_else(|| settings.default_resources.cpus.clone()),
            memory: config
                .memory
                .clone()
                .unwrap_or_else(|| settings.default_resources.memory.clone()),
        };

        let spec = Self {
            id: SandboxId::for_directory(&strategy_dir),
            strategy_dir,
            user_id: config.user_id.clone(),
            image: settings.image.clone(),
            env,
            egress: settings.egress.clone(),
            feed: settings.feed.clone(),
            resources,
        };
        (spec, dropped)
    }
}
