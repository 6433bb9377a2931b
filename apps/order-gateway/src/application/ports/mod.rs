//! Application Ports (Driven)
//!
//! Interfaces for the external systems the gateway depends on.

mod broker_port;
mod ledger_port;

pub use broker_port::{AccountSnapshot, BrokerError, BrokerPort, Placement};
pub use ledger_port::{LedgerError, LedgerPort};

#[cfg(test)]
pub use broker_port::MockBrokerPort;
#[cfg(test)]
pub use ledger_port::MockLedgerPort;
