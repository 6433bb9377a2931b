//! sandboxctl
//!
//! Operator CLI for strategy sandboxes.
//!
//! # Usage
//!
//! ```bash
//! sandboxctl start                 # every strategy under STRATEGIES_DIR
//! sandboxctl stop strategies/bob   # one strategy
//! sandboxctl status --parallel 4
//! sandboxctl logs strategies/bob --follow --tail 50
//! ```
//!
//! # Environment Variables
//!
//! - `STRATEGIES_DIR`: Strategies root (default: `./strategies`)
//! - `DESK_SERVER_URL`: Gateway URL injected into sandboxes (default: `http://order-gateway:8080`)
//! - `SANDBOX_IMAGE`: Strategy image (default: `trading-desk-strategy`)
//! - `SANDBOX_NETWORK`: Internal network (default: `trading-desk-network`)
//! - `GATEWAY_CONTAINER`: Gateway attached to that network (default: `order-gateway`)
//! - `MARKET_DATA_URL`: Feed relayed to each strategy's stdin (default: `http://market-data:8090/stream`)
//! - `FEED_IMAGE`: Feed relay image (default: `curlimages/curl`)
//! - `FEED_NETWORK`: Network the relay reaches the feed on (default: `bridge`)
//! - `SANDBOX_CPUS` / `SANDBOX_MEMORY`: Default ceiling (default: `0.5` / `256m`)
//! - `DOCKER_BIN`: Docker binary (default: `docker`)
//! - `RESTART_SETTLE_MS`: Restart pause (default: 1000)
//! - `RUST_LOG`: Log level (default: warn)

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use sandbox_orchestrator::application::LogOptions;
use sandbox_orchestrator::infrastructure::DockerPlatform;
use sandbox_orchestrator::infrastructure::config::OrchestratorConfig;
use sandbox_orchestrator::{Action, InstanceReport, Logs, Orchestrator, SandboxRegistry};

#[derive(Parser, Debug)]
#[command(name = "sandboxctl")]
#[command(about = "Manage strategy sandboxes", long_about = None)]
struct Cli {
    /// Directory containing strategy directories
    #[arg(long, global = true)]
    strategies_dir: Option<PathBuf>,

    /// Gateway URL injected into sandboxes
    #[arg(long, global = true)]
    server_url: Option<String>,

    /// Directories processed at once in batch mode
    #[arg(long, global = true, default_value_t = 1)]
    parallel: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Launch sandboxes that are not running
    Start {
        /// Strategy directory (all strategies if omitted)
        dir: Option<PathBuf>,
    },
    /// Terminate and remove sandboxes
    Stop {
        /// Strategy directory (all strategies if omitted)
        dir: Option<PathBuf>,
    },
    /// Stop then start sandboxes
    Restart {
        /// Strategy directory (all strategies if omitted)
        dir: Option<PathBuf>,
    },
    /// Show observed sandbox state
    Status {
        /// Strategy directory (all strategies if omitted)
        dir: Option<PathBuf>,
    },
    /// Show sandbox output
    Logs {
        /// Strategy directory
        dir: PathBuf,
        /// Keep streaming new output
        #[arg(short, long)]
        follow: bool,
        /// Number of trailing lines
        #[arg(long, default_value_t = 100)]
        tail: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    load_dotenv();
    init_tracing();

    let cli = Cli::parse();

    let mut config = OrchestratorConfig::from_env().context("invalid orchestrator configuration")?;
    if let Some(dir) = cli.strategies_dir {
        config.strategies_dir = dir;
    }
    if let Some(url) = cli.server_url {
        config.desk_server_url = url;
    }
    tracing::debug!(?config, "Configuration loaded");

    let orchestrator = Orchestrator::new(
        Arc::new(DockerPlatform::new(config.docker_bin.clone())),
        SandboxRegistry::new(config.strategies_dir.clone()),
        config.launch_settings(),
        config.restart_settle,
    );

    let (action, dir) = match cli.command {
        Command::Start { dir } => (Action::Start, dir),
        Command::Stop { dir } => (Action::Stop, dir),
        Command::Restart { dir } => (Action::Restart, dir),
        Command::Status { dir } => (Action::Status, dir),
        Command::Logs { dir, follow, tail } => {
            check_strategy_dir(&dir)?;
            return stream_logs(&orchestrator, &dir, LogOptions { tail, follow }).await;
        }
    };

    let reports = if let Some(dir) = dir {
        check_strategy_dir(&dir)?;
        vec![orchestrator.apply(action, &dir).await]
    } else {
        let reports = orchestrator.run_batch(action, cli.parallel).await?;
        if reports.is_empty() {
            println!(
                "No strategy directories with strategy.py found in {}",
                config.strategies_dir.display()
            );
        }
        reports
    };

    Ok(summarize(&reports))
}

fn summarize(reports: &[InstanceReport]) -> ExitCode {
    for report in reports {
        println!("{report}");
    }
    if reports.iter().any(InstanceReport::is_failure) {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

async fn stream_logs(
    orchestrator: &Orchestrator<DockerPlatform>,
    dir: &Path,
    options: LogOptions,
) -> anyhow::Result<ExitCode> {
    match orchestrator.logs(dir, options).await? {
        Logs::Warning(warning) => {
            println!("warning: {warning}");
            Ok(ExitCode::SUCCESS)
        }
        Logs::Stream(mut lines) => {
            while let Some(line) = lines.next().await {
                println!("{}", line?);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn check_strategy_dir(dir: &Path) -> anyhow::Result<()> {
    if !dir.exists() {
        bail!("strategy directory not found: {}", dir.display());
    }
    if !SandboxRegistry::is_strategy_dir(dir) {
        bail!("no strategy.py found in {}", dir.display());
    }
    Ok(())
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Initialize the tracing subscriber on stderr so report lines own stdout.
#[allow(clippy::expect_used)]
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(
                "sandbox_orchestrator=warn"
                    .parse()
                    .expect("static directive 'sandbox_orchestrator=warn' is valid"),
            ),
        )
        .init();
}
