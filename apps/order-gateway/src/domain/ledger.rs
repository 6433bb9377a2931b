//! Ledger records: strategies, trades and positions.
//!
//! Quantities and prices are kept as the decimal strings that were received
//! so the audit trail never carries rounding from a float conversion.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `order_status` recorded for orders that never reached placement.
pub const REJECTED_STATUS: &str = "rejected";

/// Deployment status of a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyStatus {
    /// Deployed and allowed to trade.
    Active,
    /// Deployed but suspended.
    Paused,
    /// Not running.
    Stopped,
}

impl StrategyStatus {
    /// Column representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
        }
    }
}

impl FromStr for StrategyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "paused" => Ok(Self::Paused),
            "stopped" => Ok(Self::Stopped),
            other => Err(format!("unknown strategy status '{other}'")),
        }
    }
}

impl fmt::Display for StrategyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A deployed strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Strategy {
    /// Row id.
    pub id: i64,
    /// Owning user.
    pub user_id: String,
    /// Name, unique per user.
    pub name: String,
    /// Path of the strategy code.
    pub file_path: String,
    /// Deployment status.
    pub status: StrategyStatus,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to register a strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStrategy {
    /// Owning user.
    pub user_id: String,
    /// Name, unique per user.
    pub name: String,
    /// Path of the strategy code.
    pub file_path: String,
    /// Initial status.
    pub status: StrategyStatus,
}

/// A recorded gateway invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    /// Row id.
    pub id: i64,
    /// Strategy that sent the order, if known.
    pub strategy_id: Option<i64>,
    /// User the order is attributed to.
    pub user_id: String,
    /// Broker order id; empty when the order was never placed.
    pub order_id: String,
    /// Symbol.
    pub symbol: String,
    /// Quantity.
    pub qty: String,
    /// Side.
    pub side: String,
    /// Order type.
    pub order_type: String,
    /// Time in force.
    pub time_in_force: String,
    /// Limit price.
    pub limit_price: Option<String>,
    /// Stop price.
    pub stop_price: Option<String>,
    /// Filled quantity.
    pub filled_qty: String,
    /// Average fill price.
    pub filled_avg_price: Option<String>,
    /// Broker order status, or `rejected`.
    pub order_status: String,
    /// When the gateway handled the order.
    pub submitted_at: DateTime<Utc>,
    /// When the order filled.
    pub filled_at: Option<DateTime<Utc>>,
    /// Rejection reason.
    pub error_message: Option<String>,
}

impl Trade {
    /// Whether the order was turned away before or by the broker.
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        self.order_status == REJECTED_STATUS
    }
}

/// A trade row to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTrade {
    /// Strategy that sent the order, if known.
    pub strategy_id: Option<i64>,
    /// User the order is attributed to.
    pub user_id: String,
    /// Broker order id; empty when the order was never placed.
    pub order_id: String,
    /// Symbol.
    pub symbol: String,
    /// Quantity.
    pub qty: String,
    /// Side.
    pub side: String,
    /// Order type.
    pub order_type: String,
    /// Time in force.
    pub time_in_force: String,
    /// Limit price.
    pub limit_price: Option<String>,
    /// Stop price.
    pub stop_price: Option<String>,
    /// Filled quantity.
    pub filled_qty: String,
    /// Average fill price.
    pub filled_avg_price: Option<String>,
    /// Broker order status, or `rejected`.
    pub order_status: String,
    /// When the gateway handled the order.
    pub submitted_at: DateTime<Utc>,
    /// When the order filled.
    pub filled_at: Option<DateTime<Utc>>,
    /// Rejection reason.
    pub error_message: Option<String>,
}

/// Fill confirmation applied to an existing trade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillUpdate {
    /// Broker order id of the trade to update.
    pub order_id: String,
    /// New broker status.
    pub order_status: String,
    /// Filled quantity.
    pub filled_qty: String,
    /// Average fill price.
    pub filled_avg_price: Option<String>,
    /// Fill time.
    pub filled_at: Option<DateTime<Utc>>,
}

/// Current holding of one symbol by one strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Row id.
    pub id: i64,
    /// Owning strategy.
    pub strategy_id: i64,
    /// Owning user.
    pub user_id: String,
    /// Symbol.
    pub symbol: String,
    /// Signed quantity.
    pub qty: String,
    /// Average entry price.
    pub avg_entry_price: String,
    /// Last price.
    pub current_price: Option<String>,
    /// Market value at `current_price`.
    pub market_value: Option<String>,
    /// Unrealized profit and loss.
    pub unrealized_pl: Option<String>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

/// Position snapshot to insert or replace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionUpdate {
    /// Owning strategy.
    pub strategy_id: i64,
    /// Owning user.
    pub user_id: String,
    /// Symbol.
    pub symbol: String,
    /// Signed quantity.
    pub qty: String,
    /// Average entry price.
    pub avg_entry_price: String,
    /// Last price.
    pub current_price: Option<String>,
    /// Market value at `current_price`.
    pub market_value: Option<String>,
    /// Unrealized profit and loss.
    pub unrealized_pl: Option<String>,
}
