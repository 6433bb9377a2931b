//! Sandbox Orchestrator
//!
//! Reconciles operator intent with what the platform reports. Nothing about
//! a sandbox is remembered between calls: every operation starts by
//! observing the live platform.
//!
//! ```text
//! NotDeployed --start--> Running --stop--> NotDeployed
//!                          |
//!                 (external kill)
//!                          v
//!                  StoppedRegistered --start--> Running (stale instance removed)
//!                          |
//!                          +--stop--> NotDeployed
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::{StreamExt, stream};

use super::ports::{LogOptions, LogStream, PlatformError, SandboxPlatform};
use super::registry::SandboxRegistry;
use crate::domain::{ENTRY_FILE, LaunchSettings, ObservedState, SandboxId, SandboxSpec, SandboxStatus};

/// Lifecycle action applied to one or many strategy directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Launch if not running.
    Start,
    /// Terminate and remove if present.
    Stop,
    /// Stop, settle, start.
    Restart,
    /// Report observed state.
    Status,
}

/// Non-fatal condition: the operation was a no-op.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrchestratorWarning {
    /// Start requested while running.
    #[error("{0} is already running")]
    AlreadyRunning(SandboxId),

    /// Stop or logs requested for an absent instance.
    #[error("{0} is not deployed")]
    NotDeployed(SandboxId),
}

/// Per-instance failure.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// Directory has no entry file.
    #[error("no {} found in {}", ENTRY_FILE, .0.display())]
    MissingEntryFile(PathBuf),

    /// Directory path could not be made absolute.
    #[error("cannot resolve {}: {source}", path.display())]
    InvalidDirectory {
        /// Offending path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Strategies root could not be listed.
    #[error("cannot list strategies in {}: {source}", root.display())]
    Discovery {
        /// Strategies root.
        root: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Platform call failed.
    #[error("{source}")]
    Platform {
        /// Sandbox the call was for.
        id: SandboxId,
        /// Platform error.
        #[source]
        source: PlatformError,
    },
}

/// Successful result of one lifecycle operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Instance launched.
    Started {
        /// Attributed user.
        user_id: String,
    },
    /// Instance terminated and removed.
    Stopped,
    /// Instance relaunched.
    Restarted {
        /// Attributed user.
        user_id: String,
    },
    /// Observed state.
    Status(ObservedState),
    /// Nothing to do.
    Warning(OrchestratorWarning),
}

/// One line of a batch report.
#[derive(Debug)]
pub struct InstanceReport {
    /// Sandbox identity.
    pub id: SandboxId,
    /// Strategy directory as given.
    pub dir: PathBuf,
    /// What happened.
    pub result: Result<Outcome, OrchestratorError>,
}

impl InstanceReport {
    /// Whether this instance failed. Warnings are not failures.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        self.result.is_err()
    }
}

impl fmt::Display for InstanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = &self.id;
        match &self.result {
            Ok(Outcome::Started { user_id }) => write!(f, "{id}: started (user: {user_id})"),
            Ok(Outcome::Restarted { user_id }) => write!(f, "{id}: restarted (user: {user_id})"),
            Ok(Outcome::Stopped) => write!(f, "{id}: stopped"),
            Ok(Outcome::Status(state)) => {
                let status = SandboxStatus::from(state);
                match state {
                    ObservedState::Running {
                        started_at: Some(at),
                    } => write!(f, "{id}: {status} (started: {})", at.format("%Y-%m-%dT%H:%M:%S")),
                    ObservedState::Stopped { detail } => write!(f, "{id}: {status} ({detail})"),
                    _ => write!(f, "{id}: {status}"),
                }
            }
            Ok(Outcome::Warning(warning)) => write!(f, "warning: {warning}"),
            Err(e) => write!(f, "{id}: failed: {e}"),
        }
    }
}

/// Result of a logs request.
pub enum Logs {
    /// Output stream.
    Stream(LogStream),
    /// Nothing to stream.
    Warning(OrchestratorWarning),
}

/// Sandbox lifecycle controller.
pub struct Orchestrator<P> {
    platform: Arc<P>,
    registry: SandboxRegistry,
    settings: LaunchSettings,
    settle: Duration,
}

impl<P: SandboxPlatform> Orchestrator<P> {
    /// Create an orchestrator.
    ///
    /// `settle` is the pause between stop and start during a restart.
    #[must_use]
    pub const fn new(
        platform: Arc<P>,
        registry: SandboxRegistry,
        settings: LaunchSettings,
        settle: Duration,
    ) -> Self {
        Self {
            platform,
            registry,
            settings,
            settle,
        }
    }

    /// Launch the sandbox for `dir` unless it is already running.
    pub async fn start(&self, dir: &Path) -> Result<Outcome, OrchestratorError> {
        if !SandboxRegistry::is_strategy_dir(dir) {
            return Err(OrchestratorError::MissingEntryFile(dir.to_path_buf()));
        }
        let dir = absolute(dir)?;
        let id = SandboxRegistry::identity(&dir);
        let platform_err = |source: PlatformError| OrchestratorError::Platform {
            id: id.clone(),
            source,
        };

        match self.platform.observe(&id).await.map_err(platform_err)? {
            ObservedState::Running { .. } => {
                tracing::warn!(sandbox = %id, "Sandbox already running");
                return Ok(Outcome::Warning(OrchestratorWarning::AlreadyRunning(
                    id.clone(),
                )));
            }
            ObservedState::Stopped { detail } => {
                tracing::info!(sandbox = %id, %detail, "Removing stale sandbox");
                self.platform.remove(&id).await.map_err(platform_err)?;
            }
            ObservedState::Absent => {}
        }

        let config = SandboxRegistry::resolve_config(&dir);
        let (spec, dropped) = SandboxSpec::assemble(dir, &config, &self.settings);
        if !dropped.is_empty() {
            tracing::warn!(sandbox = %id, keys = ?dropped, "Ignoring reserved env keys in strategy config");
        }

        self.platform
            .ensure_network(&spec.egress)
            .await
            .map_err(platform_err)?;

        tracing::info!(
            sandbox = %id,
            user_id = %spec.user_id,
            image = %spec.image,
            network = %spec.egress.network,
            cpus = %spec.resources.cpus,
            memory = %spec.resources.memory,
            "Starting sandbox"
        );

        if let Err(source) = self.platform.launch(&spec).await {
            // A half-created instance would make the next start see StoppedRegistered.
            if let Err(cleanup) = self.platform.remove(&id).await {
                tracing::warn!(sandbox = %id, error = %cleanup, "Cleanup after failed launch failed");
            }
            tracing::error!(sandbox = %id, error = %source, "Sandbox launch failed");
            return Err(platform_err(source));
        }

        tracing::info!(sandbox = %id, "Sandbox started");
        Ok(Outcome::Started {
            user_id: spec.user_id,
        })
    }

    /// Terminate and remove the sandbox for `dir` if it exists.
    pub async fn stop(&self, dir: &Path) -> Result<Outcome, OrchestratorError> {
        let id = SandboxRegistry::identity(dir);
        let platform_err = |source: PlatformError| OrchestratorError::Platform {
            id: id.clone(),
            source,
        };

        if self.platform.observe(&id).await.map_err(platform_err)? == ObservedState::Absent {
            tracing::warn!(sandbox = %id, "Sandbox not deployed");
            return Ok(Outcome::Warning(OrchestratorWarning::NotDeployed(
                id.clone(),
            )));
        }

        tracing::info!(sandbox = %id, "Stopping sandbox");
        self.platform.remove(&id).await.map_err(platform_err)?;
        Ok(Outcome::Stopped)
    }

    /// Stop, wait for the settle delay, start.
    pub async fn restart(&self, dir: &Path) -> Result<Outcome, OrchestratorError> {
        if self.stop(dir).await? == Outcome::Stopped {
            tokio::time::sleep(self.settle).await;
        }
        match self.start(dir).await? {
            Outcome::Started { user_id } => Ok(Outcome::Restarted { user_id }),
            other => Ok(other),
        }
    }

    /// Observed state of the sandbox for `dir`.
    pub async fn status(&self, dir: &Path) -> Result<Outcome, OrchestratorError> {
        let id = SandboxRegistry::identity(dir);
        match self.platform.observe(&id).await {
            Ok(state) => Ok(Outcome::Status(state)),
            Err(source) => Err(OrchestratorError::Platform { id, source }),
        }
    }

    /// Output of the sandbox for `dir`.
    pub async fn logs(&self, dir: &Path, options: LogOptions) -> Result<Logs, OrchestratorError> {
        let id = SandboxRegistry::identity(dir);
        let platform_err = |source: PlatformError| OrchestratorError::Platform {
            id: id.clone(),
            source,
        };

        if self.platform.observe(&id).await.map_err(platform_err)? == ObservedState::Absent {
            return Ok(Logs::Warning(OrchestratorWarning::NotDeployed(id.clone())));
        }
        let stream = self.platform.logs(&id, options).await.map_err(platform_err)?;
        Ok(Logs::Stream(stream))
    }

    /// Apply `action` to one directory, capturing the result as a report.
    pub async fn apply(&self, action: Action, dir: &Path) -> InstanceReport {
        let result = match action {
            Action::Start => self.start(dir).await,
            Action::Stop => self.stop(dir).await,
            Action::Restart => self.restart(dir).await,
            Action::Status => self.status(dir).await,
        };
        InstanceReport {
            id: SandboxRegistry::identity(dir),
            dir: dir.to_path_buf(),
            result,
        }
    }

    /// Apply `action` to every strategy directory under the root.
    ///
    /// Up to `parallel` directories are processed at once. Reports come back
    /// in discovery order and one failure never stops the others.
    pub async fn run_batch(
        &self,
        action: Action,
        parallel: usize,
    ) -> Result<Vec<InstanceReport>, OrchestratorError> {
        let dirs = self
            .registry
            .discover()
            .map_err(|source| OrchestratorError::Discovery {
                root: self.registry.root().to_path_buf(),
                source,
            })?;
        tracing::info!(
            root = %self.registry.root().display(),
            count = dirs.len(),
            ?action,
            parallel,
            "Processing strategy directories"
        );

        Ok(stream::iter(dirs)
            .map(|dir| async move { self.apply(action, &dir).await })
            .buffered(parallel.max(1))
            .collect()
            .await)
    }
}

fn absolute(dir: &Path) -> Result<PathBuf, OrchestratorError> {
    std::path::absolute(dir).map_err(|source| OrchestratorError::InvalidDirectory {
        path: dir.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use mockall::predicate::eq;

    use super::*;
    use crate::application::ports::MockSandboxPlatform;
    use crate::domain::{EgressPolicy, MarketFeed, ResourceLimits};

    fn settings() -> LaunchSettings {
        LaunchSettings {
            image: "trading-desk-strategy".to_string(),
            egress: EgressPolicy {
                network: "trading-desk-network".to_string(),
                gateway_container: "order-gateway".to_string(),
                gateway_url: "http://order-gateway:8080".to_string(),
            },
            feed: MarketFeed {
                url: "http://market-data:8090/stream".to_string(),
                image: "curlimages/curl".to_string(),
                network: "bridge".to_string(),
            },
            default_resources: ResourceLimits {
                cpus: "0.5".to_string(),
                memory: "256m".to_string(),
            },
        }
    }

    fn orchestrator(root: &Path, platform: MockSandboxPlatform) -> Orchestrator<MockSandboxPlatform> {
        Orchestrator::new(
            Arc::new(platform),
            SandboxRegistry::new(root),
            settings(),
            Duration::ZERO,
        )
    }

    fn strategy(root: &Path, name: &str) -> PathBuf {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(ENTRY_FILE), "").unwrap();
        dir
    }

    fn id(name: &str) -> SandboxId {
        SandboxId::for_directory(Path::new(name))
    }

    #[tokio::test]
    async fn failed_launch_is_cleaned_up() {
        let root = tempfile::tempdir().unwrap();
        let dir = strategy(root.path(), "alice");

        let mut platform = MockSandboxPlatform::new();
        platform
            .expect_observe()
            .returning(|_| Ok(ObservedState::Absent));
        platform.expect_ensure_network().returning(|_| Ok(()));
        platform
            .expect_launch()
            .times(1)
            .returning(|_| Err(PlatformError::Unavailable("image not found".to_string())));
        platform
            .expect_remove()
            .with(eq(id("alice")))
            .times(1)
            .returning(|_| Ok(()));

        let err = orchestrator(root.path(), platform)
            .start(&dir)
            .await
            .unwrap_err();

        assert!(matches!(err, OrchestratorError::Platform { id: failed, .. } if failed == id("alice")));
    }

    #[tokio::test]
    async fn network_failure_prevents_launch() {
        let root = tempfile::tempdir().unwrap();
        let dir = strategy(root.path(), "alice");

        let mut platform = MockSandboxPlatform::new();
        platform
            .expect_observe()
            .returning(|_| Ok(ObservedState::Absent));
        platform.expect_ensure_network().returning(|_| {
            Err(PlatformError::CommandFailed {
                command: "docker network create".to_string(),
                code: Some(1),
                stderr: "permission denied".to_string(),
            })
        });
        platform.expect_launch().never();

        let result = orchestrator(root.path(), platform).start(&dir).await;

        assert!(matches!(result, Err(OrchestratorError::Platform { .. })));
    }

    #[tokio::test]
    async fn stale_instance_is_removed_before_launch() {
        let root = tempfile::tempdir().unwrap();
        let dir = strategy(root.path(), "alice");

        let mut seq = mockall::Sequence::new();
        let mut platform = MockSandboxPlatform::new();
        platform.expect_observe().returning(|_| {
            Ok(ObservedState::Stopped {
                detail: "exited".to_string(),
            })
        });
        platform
            .expect_remove()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        platform.expect_ensure_network().returning(|_| Ok(()));
        platform
            .expect_launch()
            .withf(|spec| spec.user_id == "alice" && spec.strategy_dir.is_absolute())
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let outcome = orchestrator(root.path(), platform).start(&dir).await.unwrap();

        assert_eq!(
            outcome,
            Outcome::Started {
                user_id: "alice".to_string()
            }
        );
    }

    #[tokio::test]
    async fn start_requires_entry_file() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("empty");
        fs::create_dir(&dir).unwrap();

        let mut platform = MockSandboxPlatform::new();
        platform.expect_observe().never();

        let err = orchestrator(root.path(), platform)
            .start(&dir)
            .await
            .unwrap_err();

        assert!(matches!(err, OrchestratorError::MissingEntryFile(_)));
    }

    #[tokio::test]
    async fn status_reports_platform_errors() {
        let root = tempfile::tempdir().unwrap();
        let dir = strategy(root.path(), "alice");

        let mut platform = MockSandboxPlatform::new();
        platform
            .expect_observe()
            .returning(|_| Err(PlatformError::Parse("garbage".to_string())));

        let report = orchestrator(root.path(), platform)
            .apply(Action::Status, &dir)
            .await;

        assert!(report.is_failure());
        assert_eq!(report.to_string(), "strategy-alice: failed: unexpected platform output: garbage");
    }

    #[tokio::test]
    async fn relative_directory_targets_the_registry_identity() {
        let root = tempfile::tempdir().unwrap();
        let expected = SandboxRegistry::identity(Path::new("."));

        let mut platform = MockSandboxPlatform::new();
        platform
            .expect_observe()
            .with(eq(expected.clone()))
            .times(2)
            .returning(|_| Ok(ObservedState::Absent));
        let orchestrator = orchestrator(root.path(), platform);

        let status = orchestrator.apply(Action::Status, Path::new(".")).await;
        let stop = orchestrator.apply(Action::Stop, Path::new("./")).await;

        assert_eq!(status.id, expected);
        assert_eq!(stop.id, expected);
    }

    #[tokio::test]
    async fn logs_for_absent_instance_is_a_warning() {
        let root = tempfile::tempdir().unwrap();
        let dir = strategy(root.path(), "alice");

        let mut platform = MockSandboxPlatform::new();
        platform
            .expect_observe()
            .returning(|_| Ok(ObservedState::Absent));
        platform.expect_logs().never();

        let logs = orchestrator(root.path(), platform)
            .logs(&dir, LogOptions::default())
            .await
            .unwrap();

        assert!(matches!(logs, Logs::Warning(OrchestratorWarning::NotDeployed(_))));
    }

    #[test]
    fn report_lines() {
        let report = |result| InstanceReport {
            id: id("bob"),
            dir: PathBuf::from("bob"),
            result,
        };
        assert_eq!(
            report(Ok(Outcome::Started {
                user_id: "bob".to_string()
            }))
            .to_string(),
            "strategy-bob: started (user: bob)"
        );
        assert_eq!(
            report(Ok(Outcome::Status(ObservedState::Absent))).to_string(),
            "strategy-bob: not-deployed"
        );
        assert_eq!(
            report(Ok(Outcome::Status(ObservedState::Stopped {
                detail: "exited".to_string()
            })))
            .to_string(),
            "strategy-bob: stopped-but-registered (exited)"
        );
        let warning = report(Ok(Outcome::Warning(OrchestratorWarning::NotDeployed(id("bob")))));
        assert_eq!(warning.to_string(), "warning: strategy-bob is not deployed");
        assert!(!warning.is_failure());
    }
}
