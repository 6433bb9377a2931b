//! Order tickets and pre-trade validation.
//!
//! Strategies send orders as loosely typed strings. [`OrderTicket::from_draft`]
//! is the only way to obtain a ticket the broker adapter will accept, so every
//! order that reaches the network has already passed these checks.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSide {
    /// Buy to open or cover.
    Buy,
    /// Sell to close or short.
    Sell,
}

impl OrderSide {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

impl FromStr for OrderSide {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Ok(Self::Buy),
            "sell" => Ok(Self::Sell),
            _ => Err(ValidationError::InvalidSide(s.to_string())),
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order type as named on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    /// Execute at best available price.
    Market,
    /// Execute at the limit price or better.
    Limit,
    /// Becomes a market order once the stop price trades.
    Stop,
    /// Becomes a limit order once the stop price trades.
    StopLimit,
}

impl OrderType {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Market => "market",
            Self::Limit => "limit",
            Self::Stop => "stop",
            Self::StopLimit => "stop_limit",
        }
    }

    /// Returns true if this order type requires a limit price.
    #[must_use]
    pub const fn requires_limit_price(&self) -> bool {
        matches!(self, Self::Limit | Self::StopLimit)
    }

    /// Returns true if this order type requires a stop price.
    #[must_use]
    pub const fn requires_stop_price(&self) -> bool {
        matches!(self, Self::Stop | Self::StopLimit)
    }
}

impl FromStr for OrderType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "market" => Ok(Self::Market),
            "limit" => Ok(Self::Limit),
            "stop" => Ok(Self::Stop),
            "stop_limit" => Ok(Self::StopLimit),
            _ => Err(ValidationError::InvalidOrderType(s.to_string())),
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How long an order stays working.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeInForce {
    /// Good for the trading day.
    Day,
    /// Good until canceled.
    Gtc,
    /// Immediate or cancel.
    Ioc,
    /// Fill or kill.
    Fok,
}

impl TimeInForce {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Gtc => "gtc",
            Self::Ioc => "ioc",
            Self::Fok => "fok",
        }
    }
}

impl FromStr for TimeInForce {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(Self::Day),
            "gtc" => Ok(Self::Gtc),
            "ioc" => Ok(Self::Ioc),
            "fok" => Ok(Self::Fok),
            _ => Err(ValidationError::InvalidTimeInForce(s.to_string())),
        }
    }
}

impl fmt::Display for TimeInForce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order type together with exactly the prices it needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderKind {
    /// Market order.
    Market,
    /// Limit order.
    Limit {
        /// Worst acceptable price.
        limit_price: Decimal,
    },
    /// Stop order.
    Stop {
        /// Trigger price.
        stop_price: Decimal,
    },
    /// Stop-limit order.
    StopLimit {
        /// Worst acceptable price once triggered.
        limit_price: Decimal,
        /// Trigger price.
        stop_price: Decimal,
    },
}

impl OrderKind {
    /// The untagged order type.
    #[must_use]
    pub const fn order_type(&self) -> OrderType {
        match self {
            Self::Market => OrderType::Market,
            Self::Limit { .. } => OrderType::Limit,
            Self::Stop { .. } => OrderType::Stop,
            Self::StopLimit { .. } => OrderType::StopLimit,
        }
    }

    /// Limit price, if this kind carries one.
    #[must_use]
    pub const fn limit_price(&self) -> Option<Decimal> {
        match self {
            Self::Limit { limit_price } | Self::StopLimit { limit_price, .. } => Some(*limit_price),
            Self::Market | Self::Stop { .. } => None,
        }
    }

    /// Stop price, if this kind carries one.
    #[must_use]
    pub const fn stop_price(&self) -> Option<Decimal> {
        match self {
            Self::Stop { stop_price } | Self::StopLimit { stop_price, .. } => Some(*stop_price),
            Self::Market | Self::Limit { .. } => None,
        }
    }
}

/// Order fields exactly as received from a strategy, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDraft {
    /// Ticker symbol.
    pub symbol: String,
    /// Quantity as a decimal string.
    pub qty: String,
    /// `buy` or `sell`.
    pub side: String,
    /// `market`, `limit`, `stop` or `stop_limit`.
    pub order_type: String,
    /// `day`, `gtc`, `ioc` or `fok`.
    pub time_in_force: String,
    /// Limit price as a decimal string.
    pub limit_price: Option<String>,
    /// Stop price as a decimal string.
    pub stop_price: Option<String>,
}

/// A validated order, ready for the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderTicket {
    /// Upper-cased ticker symbol.
    pub symbol: String,
    /// Strictly positive quantity.
    pub qty: Decimal,
    /// Order side.
    pub side: OrderSide,
    /// Order type with its prices.
    pub kind: OrderKind,
    /// Time in force.
    pub time_in_force: TimeInForce,
}

impl OrderTicket {
    /// Validate a draft.
    ///
    /// Prices that the order type does not use are dropped rather than
    /// forwarded to the broker.
    pub fn from_draft(draft: &OrderDraft) -> Result<Self, ValidationError> {
        let symbol = draft.symbol.trim();
        if symbol.is_empty() {
            return Err(ValidationError::EmptySymbol);
        }

        let qty = parse_positive_decimal(&draft.qty)
            .ok_or_else(|| ValidationError::InvalidQuantity(draft.qty.clone()))?;
        let side: OrderSide = draft.side.parse()?;
        let order_type: OrderType = draft.order_type.parse()?;
        let time_in_force: TimeInForce = draft.time_in_force.parse()?;

        let limit_price = if order_type.requires_limit_price() {
            Some(required_price(
                order_type,
                "limit_price",
                draft.limit_price.as_deref(),
            )?)
        } else {
            None
        };
        let stop_price = if order_type.requires_stop_price() {
            Some(required_price(
                order_type,
                "stop_price",
                draft.stop_price.as_deref(),
            )?)
        } else {
            None
        };

        let kind = match (order_type, limit_price, stop_price) {
            (OrderType::Limit, Some(limit_price), _) => OrderKind::Limit { limit_price },
            (OrderType::Stop, _, Some(stop_price)) => OrderKind::Stop { stop_price },
            (OrderType::StopLimit, Some(limit_price), Some(stop_price)) => OrderKind::StopLimit {
                limit_price,
                stop_price,
            },
            _ => OrderKind::Market,
        };

        Ok(Self {
            symbol: symbol.to_ascii_uppercase(),
            qty,
            side,
            kind,
            time_in_force,
        })
    }
}

fn required_price(
    order_type: OrderType,
    field: &'static str,
    raw: Option<&str>,
) -> Result<Decimal, ValidationError> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty());
    let Some(raw) = raw else {
        return Err(ValidationError::MissingPrice { order_type, field });
    };
    parse_positive_decimal(raw).ok_or_else(|| ValidationError::InvalidPrice {
        field,
        value: raw.to_string(),
    })
}

/// Parse a strictly positive decimal, rejecting zero, negatives and garbage.
#[must_use]
pub fn parse_positive_decimal(raw: &str) -> Option<Decimal> {
    raw.trim()
        .parse::<Decimal>()
        .ok()
        .filter(|d| d.is_sign_positive() && !d.is_zero())
}

/// Reasons an order is rejected before it reaches the broker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Symbol missing or blank.
    #[error("symbol is required")]
    EmptySymbol,

    /// Quantity is not a positive decimal.
    #[error("qty must be a positive decimal, got '{0}'")]
    InvalidQuantity(String),

    /// Side is not buy or sell.
    #[error("side must be 'buy' or 'sell', got '{0}'")]
    InvalidSide(String),

    /// Unknown order type.
    #[error("order_type must be one of market, limit, stop, stop_limit, got '{0}'")]
    InvalidOrderType(String),

    /// Unknown time in force.
    #[error("time_in_force must be one of day, gtc, ioc, fok, got '{0}'")]
    InvalidTimeInForce(String),

    /// The order type needs a price that was not supplied.
    #[error("{order_type} orders require {field}")]
    MissingPrice {
        /// Order type that needs the price.
        order_type: OrderType,
        /// Missing field name.
        field: &'static str,
    },

    /// A required price is not a positive decimal.
    #[error("{field} must be a positive decimal, got '{value}'")]
    InvalidPrice {
        /// Field name.
        field: &'static str,
        /// Raw value.
        value: String,
    },
}
