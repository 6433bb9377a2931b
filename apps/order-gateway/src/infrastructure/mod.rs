//! Infrastructure Layer
//!
//! Adapters connecting the application ports to the outside world:
//!
//! - **Broker**: Alpaca trading API client
//! - **Ledger**: SQLite trade ledger
//! - **HTTP**: protobuf order endpoint
//! - **Config**: environment settings

pub mod broker;
pub mod config;
pub mod http;
pub mod ledger;
