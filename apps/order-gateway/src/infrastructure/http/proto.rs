//! Wire messages for `POST /order`.
//!
//! Mirrors `packages/proto/desk/v1/orders.proto`. Field tags must stay in sync
//! with that file.

use crate::application::dto::{OrderErrorKind, SubmitOrderResponseDto};
use crate::domain::{OrderDraft, REJECTED_STATUS};

/// `status` value of a placed order.
pub const STATUS_SUCCESS: &str = "success";
/// `status` value of any failure.
pub const STATUS_ERROR: &str = "error";

/// Order submitted by a strategy.
#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct OrderRequest {
    /// Ticker symbol.
    #[prost(string, tag = "1")]
    pub symbol: String,
    /// Quantity as a decimal string.
    #[prost(string, tag = "2")]
    pub qty: String,
    /// `buy` or `sell`.
    #[prost(string, tag = "3")]
    pub side: String,
    /// `market`, `limit`, `stop` or `stop_limit`.
    #[prost(string, tag = "4")]
    pub order_type: String,
    /// `day`, `gtc`, `ioc` or `fok`.
    #[prost(string, tag = "5")]
    pub time_in_force: String,
    /// Limit price as a decimal string.
    #[prost(string, optional, tag = "6")]
    pub limit_price: Option<String>,
    /// Stop price as a decimal string.
    #[prost(string, optional, tag = "7")]
    pub stop_price: Option<String>,
}

/// Gateway answer to an [`OrderRequest`].
#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct OrderResponse {
    /// `success` or `error`.
    #[prost(string, tag = "1")]
    pub status: String,
    /// Broker order id, empty on error.
    #[prost(string, tag = "2")]
    pub order_id: String,
    /// Human readable outcome.
    #[prost(string, tag = "3")]
    pub message: String,
    /// Normalized symbol.
    #[prost(string, tag = "4")]
    pub symbol: String,
    /// Quantity as submitted.
    #[prost(string, tag = "5")]
    pub qty: String,
    /// Side.
    #[prost(string, tag = "6")]
    pub side: String,
    /// Filled quantity at acknowledgement.
    #[prost(string, tag = "7")]
    pub filled_qty: String,
    /// Broker order status.
    #[prost(string, tag = "8")]
    pub order_status: String,
    /// `validation`, `rejected` or `transient`; empty on success.
    #[prost(string, tag = "9")]
    pub error_kind: String,
}

impl OrderResponse {
    /// An error response carrying no order fields.
    #[must_use]
    pub fn error(kind: OrderErrorKind, message: impl Into<String>) -> Self {
        Self {
            status: STATUS_ERROR.to_string(),
            message: message.into(),
            error_kind: kind.as_str().to_string(),
            ..Self::default()
        }
    }
}

impl From<OrderRequest> for OrderDraft {
    fn from(request: OrderRequest) -> Self {
        let price = |p: Option<String>| p.filter(|s| !s.trim().is_empty());
        Self {
            symbol: request.symbol,
            qty: request.qty,
            side: request.side,
            order_type: request.order_type,
            time_in_force: request.time_in_force,
            limit_price: price(request.limit_price),
            stop_price: price(request.stop_price),
        }
    }
}

impl From<SubmitOrderResponseDto> for OrderResponse {
    fn from(response: SubmitOrderResponseDto) -> Self {
        match response {
            SubmitOrderResponseDto::Placed {
                order_id,
                order_status,
                symbol,
                qty,
                side,
                filled_qty,
            } => Self {
                status: STATUS_SUCCESS.to_string(),
                message: format!("order {order_id} {order_status}"),
                order_id,
                symbol,
                qty,
                side,
                filled_qty,
                order_status,
                error_kind: String::new(),
            },
            SubmitOrderResponseDto::Failed {
                kind,
                message,
                symbol,
                qty,
                side,
            } => Self {
                symbol,
                qty,
                side,
                order_status: REJECTED_STATUS.to_string(),
                ..Self::error(kind, message)
            },
        }
    }
}
