//! Order Gateway Binary
//!
//! Starts the order gateway: the only process holding brokerage credentials.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin order-gateway
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `APCA_API_KEY_ID`: Broker API key
//! - `APCA_API_SECRET_KEY`: Broker API secret
//!
//! ## Optional
//! - `APCA_API_BASE_URL`: Trading API endpoint (default: <https://paper-api.alpaca.markets>)
//! - `DB_PATH`: Ledger file (default: `./trading_desk.db`)
//! - `PORT`: HTTP port (default: 8080)
//! - `BROKER_TIMEOUT_SECS`: Bound on one brokerage call (default: 10)
//! - `RUST_LOG`: Log level (default: info)

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use order_gateway::application::use_cases::SubmitOrderUseCase;
use order_gateway::infrastructure::broker::AlpacaBrokerAdapter;
use order_gateway::infrastructure::config::GatewayConfig;
use order_gateway::infrastructure::http::{AppState, create_router};
use order_gateway::infrastructure::ledger::SqliteLedger;
use tokio::net::TcpListener;
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    init_tracing();

    tracing::info!("Starting order gateway");

    let config = GatewayConfig::from_env().context("invalid gateway configuration")?;
    tracing::info!(
        base_url = %config.base_url,
        db_path = %config.db_path.display(),
        port = config.port,
        broker_timeout_secs = config.broker_timeout.as_secs(),
        "Configuration loaded"
    );

    let ledger = SqliteLedger::open(&config.db_path).context("failed to open trade ledger")?;

    let broker = match AlpacaBrokerAdapter::connect(config.alpaca_config()).await {
        Ok(broker) => broker,
        Err(e) => {
            if let Err(close_err) = ledger.close() {
                tracing::warn!(error = %close_err, "Failed to close ledger");
            }
            return Err(e).context("brokerage account check failed");
        }
    };

    let submit_order = SubmitOrderUseCase::new(
        Arc::new(broker),
        Arc::new(ledger.clone()),
        config.broker_timeout,
    );
    let state = AppState {
        submit_order: Arc::new(submit_order),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "Order gateway listening");

    let served = axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    ledger.close().context("failed to close trade ledger")?;
    served.context("HTTP server failed")?;

    tracing::info!("Order gateway stopped");
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

/// Initialize the tracing subscriber with environment filter.
///
/// Uses static directive strings that are compile-time constants guaranteed to parse.
#[allow(clippy::expect_used)]
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(
                "order_gateway=info"
                    .parse()
                    .expect("static directive 'order_gateway=info' is valid"),
            ),
        )
        .init();
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
///
/// # Panics
///
/// Panics if signal handlers cannot be installed.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
