//! Docker CLI implementation of [`SandboxPlatform`].

use std::process::{Output, Stdio};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::{StreamExt, stream};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

use crate::application::ports::{LogOptions, LogStream, PlatformError, SandboxPlatform};
use crate::domain::{EgressPolicy, ObservedState, SandboxId, SandboxSpec};

/// Where the strategy directory is mounted inside the container.
pub const STRATEGY_MOUNT: &str = "/app/strategy";

/// Where the feed relay's pipe volume is mounted in both containers.
pub const FEED_MOUNT: &str = "/feed";

/// Strategy command: wait for the relay's pipe, then run with it as stdin.
pub const STRATEGY_ENTRYPOINT: &str = "while [ ! -p /feed/market ]; do sleep 0.1; done; \
     exec python -u /app/strategy/strategy.py < /feed/market";

/// Relay command: subscribe to the feed and write it into the pipe.
pub const FEED_ENTRYPOINT: &str =
    r#"rm -f /feed/market && mkfifo -m 0644 /feed/market && exec curl -sN "$MARKET_DATA_URL" > /feed/market"#;

const LABEL_PREFIX: &str = "trading-desk";

/// Drives sandboxes through the `docker` command line.
#[derive(Debug, Clone)]
pub struct DockerPlatform {
    bin: String,
}

impl DockerPlatform {
    /// Use the given docker binary.
    #[must_use]
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    async fn exec(&self, args: &[String]) -> Result<Output, PlatformError> {
        tracing::debug!(bin = %self.bin, ?args, "docker");
        Command::new(&self.bin)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| PlatformError::Spawn {
                command: self.describe(args),
                source,
            })
    }

    async fn checked(&self, args: &[String]) -> Result<String, PlatformError> {
        let output = self.exec(args).await?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(self.failure(args, &output))
        }
    }

    fn failure(&self, args: &[String], output: &Output) -> PlatformError {
        PlatformError::CommandFailed {
            command: self.describe(args),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
    }

    fn describe(&self, args: &[String]) -> String {
        let verb: Vec<&str> = args.iter().take(2).map(String::as_str).collect();
        format!("{} {}", self.bin, verb.join(" "))
    }
}

impl Default for DockerPlatform {
    fn default() -> Self {
        Self::new("docker")
    }
}

fn strings<const N: usize>(args: [&str; N]) -> Vec<String> {
    args.iter().map(ToString::to_string).collect()
}

fn is_missing(stderr: &[u8]) -> bool {
    String::from_utf8_lossy(stderr).contains("No such")
}

fn already_exists(stderr: &[u8]) -> bool {
    String::from_utf8_lossy(stderr).contains("already exists")
}

/// Name shared by a sandbox's feed relay container and its pipe volume.
#[must_use]
pub fn feed_name(id: &SandboxId) -> String {
    format!("{id}-feed")
}

/// Arguments for `docker run` of the feed relay.
///
/// The relay never joins the sandbox network; the only thing it shares with
/// the sandbox is the pipe volume.
#[must_use]
pub fn feed_args(spec: &SandboxSpec) -> Vec<String> {
    let name = feed_name(&spec.id);
    let mut args = strings([
        "run",
        "--detach",
        "--name",
        name.as_str(),
        "--network",
        spec.feed.network.as_str(),
        "--restart",
        "no",
        "--user",
        "0",
        "--read-only",
        "--cap-drop",
        "ALL",
        "--security-opt",
        "no-new-privileges",
    ]);
    args.push("--label".to_string());
    args.push(format!("{LABEL_PREFIX}.feed-of={}", spec.id));
    args.push("--volume".to_string());
    args.push(format!("{name}:{FEED_MOUNT}"));
    args.push("--env".to_string());
    args.push(format!("MARKET_DATA_URL={}", spec.feed.url));
    args.push(spec.feed.image.clone());
    args.extend(strings(["sh", "-c", FEED_ENTRYPOINT]));
    args
}

/// Arguments for `docker run` that enforce the sandbox contract.
#[must_use]
pub fn run_args(spec: &SandboxSpec) -> Vec<String> {
    let mut args = strings([
        "run",
        "--detach",
        "--name",
        spec.id.as_str(),
        "--network",
        spec.egress.network.as_str(),
        "--restart",
        "no",
        "--cpus",
        spec.resources.cpus.as_str(),
        "--memory",
        spec.resources.memory.as_str(),
        "--memory-swap",
        spec.resources.memory.as_str(),
        "--read-only",
        "--tmpfs",
        "/tmp",
        "--cap-drop",
        "ALL",
        "--security-opt",
        "no-new-privileges",
    ]);
    args.push("--label".to_string());
    args.push(format!("{LABEL_PREFIX}.user={}", spec.user_id));
    args.push("--volume".to_string());
    args.push(format!(
        "{}:{STRATEGY_MOUNT}:ro",
        spec.strategy_dir.display()
    ));
    args.push("--volume".to_string());
    args.push(format!("{}:{FEED_MOUNT}:ro", feed_name(&spec.id)));
    for (key, value) in &spec.env {
        args.push("--env".to_string());
        args.push(format!("{key}={value}"));
    }
    args.push(spec.image.clone());
    args.extend(strings(["sh", "-c", STRATEGY_ENTRYPOINT]));
    args
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContainerState {
    status: String,
    running: bool,
    #[serde(default)]
    started_at: Option<String>,
}

/// Parse `docker container inspect --format '{{json .State}}'` output.
pub fn parse_state(raw: &str) -> Result<ObservedState, PlatformError> {
    let state: ContainerState =
        serde_json::from_str(raw.trim()).map_err(|e| PlatformError::Parse(e.to_string()))?;
    if state.running {
        let started_at = state
            .started_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc));
        Ok(ObservedState::Running { started_at })
    } else {
        Ok(ObservedState::Stopped {
            detail: state.status,
        })
    }
}

fn lines<R>(reader: R) -> LogStream
where
    R: AsyncRead + Unpin + Send + 'static,
{
    stream::unfold(Some(BufReader::new(reader).lines()), |state| async move {
        let mut lines = state?;
        match lines.next_line().await {
            Ok(Some(line)) => Some((Ok(line), Some(lines))),
            Ok(None) => None,
            Err(e) => Some((Err(PlatformError::Parse(e.to_string())), None)),
        }
    })
    .boxed()
}

#[async_trait]
impl SandboxPlatform for DockerPlatform {
    async fn observe(&self, id: &SandboxId) -> Result<ObservedState, PlatformError> {
        let args = strings([
            "container",
            "inspect",
            "--format",
            "{{json .State}}",
            id.as_str(),
        ]);
        let output = self.exec(&args).await?;
        if output.status.success() {
            parse_state(&String::from_utf8_lossy(&output.stdout))
        } else if is_missing(&output.stderr) {
            Ok(ObservedState::Absent)
        } else {
            Err(self.failure(&args, &output))
        }
    }

    async fn ensure_network(&self, egress: &EgressPolicy) -> Result<(), PlatformError> {
        let inspect = strings(["network", "inspect", egress.network.as_str()]);
        if !self.exec(&inspect).await?.status.success() {
            tracing::info!(network = %egress.network, "Creating internal sandbox network");
            let create = strings(["network", "create", "--internal", egress.network.as_str()]);
            let output = self.exec(&create).await?;
            if !output.status.success() && !already_exists(&output.stderr) {
                return Err(self.failure(&create, &output));
            }
        }

        let connect = strings([
            "network",
            "connect",
            egress.network.as_str(),
            egress.gateway_container.as_str(),
        ]);
        let output = self.exec(&connect).await?;
        if output.status.success() || already_exists(&output.stderr) {
            Ok(())
        } else {
            Err(self.failure(&connect, &output))
        }
    }

    async fn launch(&self, spec: &SandboxSpec) -> Result<(), PlatformError> {
        let relay = self.checked(&feed_args(spec)).await?;
        tracing::debug!(sandbox = %spec.id, container = %relay.trim(), "Feed relay created");
        let container = self.checked(&run_args(spec)).await?;
        tracing::debug!(sandbox = %spec.id, container = %container.trim(), "Container created");
        Ok(())
    }

    async fn remove(&self, id: &SandboxId) -> Result<(), PlatformError> {
        let feed = feed_name(id);
        for name in [id.as_str(), feed.as_str()] {
            let args = strings(["rm", "--force", name]);
            let output = self.exec(&args).await?;
            if !output.status.success() && !is_missing(&output.stderr) {
                return Err(self.failure(&args, &output));
            }
        }
        self.checked(&strings(["volume", "rm", "--force", feed.as_str()]))
            .await
            .map(|_| ())
    }

    async fn logs(&self, id: &SandboxId, options: LogOptions) -> Result<LogStream, PlatformError> {
        let mut args = strings(["logs", "--tail"]);
        args.push(options.tail.to_string());
        if options.follow {
            args.push("--follow".to_string());
        }
        args.push(id.to_string());

        let mut child = Command::new(&self.bin)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| PlatformError::Spawn {
                command: self.describe(&args),
                source,
            })?;

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            return Err(PlatformError::Unavailable("log pipes not captured".to_string()));
        };

        // Keep the child alive for as long as its output is being read.
        let reaper = stream::once(async move {
            let _ = child.wait().await;
        })
        .filter_map(|()| async { None::<Result<String, PlatformError>> });

        Ok(stream::select(lines(stdout), lines(stderr))
            .chain(reaper)
            .boxed())
    }
}
