//! Alpaca Markets Broker Adapter
//!
//! Implementation of `BrokerPort` for the Alpaca trading API:
//! - Startup account check so bad credentials fail fast
//! - Single-attempt requests with status classification
//! - Decimal quantities and prices sent as strings

mod adapter;
mod api_types;
mod config;
mod error;
mod http_client;

pub use adapter::AlpacaBrokerAdapter;
pub use config::{AlpacaConfig, PAPER_TRADING_URL};
pub use error::AlpacaError;
