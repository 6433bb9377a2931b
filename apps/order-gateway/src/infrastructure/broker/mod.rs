//! Broker adapters.

pub mod alpaca;

pub use alpaca::{AlpacaBrokerAdapter, AlpacaConfig, AlpacaError};
