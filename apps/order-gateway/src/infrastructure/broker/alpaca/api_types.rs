//! Alpaca API request and response types.
//!
//! These types map directly to Alpaca's REST API format.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::application::ports::{AccountSnapshot, Placement};
use crate::domain::OrderTicket;

use super::error::AlpacaError;

// ============================================================================
// Order Request Types
// ============================================================================

/// Order request for Alpaca API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlpacaOrderRequest {
    /// Stock symbol.
    pub symbol: String,
    /// Quantity (shares).
    pub qty: String,
    /// Order side.
    pub side: String,
    /// Order type.
    #[serde(rename = "type")]
    pub order_type: String,
    /// Time in force.
    pub time_in_force: String,
    /// Limit price (for limit orders).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<String>,
    /// Stop price (for stop orders).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_price: Option<String>,
}

impl From<&OrderTicket> for AlpacaOrderRequest {
    fn from(ticket: &OrderTicket) -> Self {
        Self {
            symbol: ticket.symbol.clone(),
            qty: ticket.qty.to_string(),
            side: ticket.side.as_str().to_string(),
            order_type: ticket.kind.order_type().as_str().to_string(),
            time_in_force: ticket.time_in_force.as_str().to_string(),
            limit_price: ticket.kind.limit_price().map(|p| p.to_string()),
            stop_price: ticket.kind.stop_price().map(|p| p.to_string()),
        }
    }
}

// ============================================================================
// Order Response Types
// ============================================================================

/// Order response from Alpaca API.
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaOrderResponse {
    /// Broker order ID.
    pub id: String,
    /// Symbol.
    pub symbol: String,
    /// Filled quantity (as string).
    #[serde(default)]
    pub filled_qty: Option<String>,
    /// Average fill price (as string).
    #[serde(default)]
    pub filled_avg_price: Option<String>,
    /// Order status.
    pub status: String,
    /// Filled timestamp.
    #[serde(default)]
    pub filled_at: Option<DateTime<Utc>>,
}

impl AlpacaOrderResponse {
    /// Convert to a [`Placement`].
    #[must_use]
    pub fn into_placement(self) -> Placement {
        Placement {
            broker_order_id: self.id,
            status: self.status,
            filled_qty: self.filled_qty.unwrap_or_else(|| "0".to_string()),
            filled_avg_price: self.filled_avg_price,
            filled_at: self.filled_at,
        }
    }
}

// ============================================================================
// Account Types
// ============================================================================

/// Account response from Alpaca API.
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaAccountResponse {
    /// Account ID.
    pub id: String,
    /// Account status.
    #[serde(default)]
    pub status: String,
    /// Buying power.
    pub buying_power: String,
}

impl TryFrom<AlpacaAccountResponse> for AccountSnapshot {
    type Error = AlpacaError;

    fn try_from(account: AlpacaAccountResponse) -> Result<Self, Self::Error> {
        let buying_power: Decimal = account.buying_power.parse().map_err(|_| {
            AlpacaError::JsonParse(format!(
                "buying_power '{}' is not a decimal",
                account.buying_power
            ))
        })?;
        Ok(Self {
            account_id: account.id,
            status: account.status,
            buying_power,
        })
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Error response body from Alpaca API.
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaErrorResponse {
    /// Error code.
    #[serde(default)]
    pub code: Option<serde_json::Value>,
    /// Error message.
    pub message: String,
}
