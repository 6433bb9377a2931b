//! Broker Port (Driven Port)
//!
//! Interface for placing orders with a brokerage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::OrderTicket;

/// Broker's acknowledgement of a placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    /// Broker-assigned order ID.
    pub broker_order_id: String,
    /// Broker order status (`new`, `accepted`, `filled`, ...).
    pub status: String,
    /// Filled quantity.
    pub filled_qty: String,
    /// Average fill price, once anything filled.
    pub filled_avg_price: Option<String>,
    /// Fill time, once fully filled.
    pub filled_at: Option<DateTime<Utc>>,
}

/// Account state used for the startup credential check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    /// Broker account ID.
    pub account_id: String,
    /// Account status.
    pub status: String,
    /// Buying power.
    pub buying_power: Decimal,
}

/// Broker port error.
///
/// The three variants decide how the gateway reports a failure; none of them
/// is retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BrokerError {
    /// The order was unfit to send; nothing reached the network.
    #[error("invalid order: {message}")]
    Validation {
        /// Error details.
        message: String,
    },

    /// The broker was reached and declined.
    #[error("order rejected: {message}")]
    Rejected {
        /// Rejection reason.
        message: String,
    },

    /// The broker could not be reached or did not answer in time.
    #[error("broker unavailable: {message}")]
    Transient {
        /// Error details.
        message: String,
    },
}

impl BrokerError {
    /// Whether a later attempt could succeed unchanged.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

/// Port for broker interactions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BrokerPort: Send + Sync {
    /// Place a validated order.
    async fn place_order(&self, ticket: &OrderTicket) -> Result<Placement, BrokerError>;

    /// Fetch account state.
    async fn get_account(&self) -> Result<AccountSnapshot, BrokerError>;
}
