//! Order submission DTOs

use serde::{Deserialize, Serialize};

use crate::application::ports::BrokerError;
use crate::domain::OrderDraft;

/// User an order is attributed to when the caller does not say.
pub const DEFAULT_USER_ID: &str = "default_user";

/// Input to [`SubmitOrderUseCase`](crate::application::SubmitOrderUseCase).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitOrderRequestDto {
    /// User the order is attributed to.
    pub user_id: String,
    /// Order fields as received.
    pub order: OrderDraft,
}

impl SubmitOrderRequestDto {
    /// Build a request, falling back to [`DEFAULT_USER_ID`] for a blank user.
    #[must_use]
    pub fn new(user_id: Option<&str>, order: OrderDraft) -> Self {
        let user_id = user_id
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or(DEFAULT_USER_ID)
            .to_string();
        Self { user_id, order }
    }
}

/// Why an order did not get placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderErrorKind {
    /// Failed local checks; the broker was never called.
    Validation,
    /// The broker declined it.
    Rejected,
    /// The broker could not be reached in time.
    Transient,
}

impl OrderErrorKind {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Rejected => "rejected",
            Self::Transient => "transient",
        }
    }
}

impl From<&BrokerError> for OrderErrorKind {
    fn from(err: &BrokerError) -> Self {
        match err {
            BrokerError::Validation { .. } => Self::Validation,
            BrokerError::Rejected { .. } => Self::Rejected,
            BrokerError::Transient { .. } => Self::Transient,
        }
    }
}

/// Result of one order submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmitOrderResponseDto {
    /// The broker accepted the order.
    Placed {
        /// Broker order id.
        order_id: String,
        /// Broker order status.
        order_status: String,
        /// Normalized symbol.
        symbol: String,
        /// Quantity as submitted.
        qty: String,
        /// Side.
        side: String,
        /// Filled quantity at acknowledgement time.
        filled_qty: String,
    },
    /// The order was not placed.
    Failed {
        /// Failure category.
        kind: OrderErrorKind,
        /// Human readable reason.
        message: String,
        /// Symbol as received, trimmed.
        symbol: String,
        /// Quantity as received, trimmed.
        qty: String,
        /// Side as received, trimmed.
        side: String,
    },
}

impl SubmitOrderResponseDto {
    /// Whether the order was placed.
    #[must_use]
    pub const fn is_placed(&self) -> bool {
        matches!(self, Self::Placed { .. })
    }

    /// The error kind, if the order failed.
    #[must_use]
    pub const fn error_kind(&self) -> Option<OrderErrorKind> {
        match self {
            Self::Placed { .. } => None,
            Self::Failed { kind, .. } => Some(*kind),
        }
    }
}
