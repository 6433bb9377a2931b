//! Submit Order Use Case

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::application::dto::{OrderErrorKind, SubmitOrderRequestDto, SubmitOrderResponseDto};
use crate::application::ports::{BrokerError, BrokerPort, LedgerPort, Placement};
use crate::domain::{NewTrade, OrderDraft, OrderTicket, REJECTED_STATUS};

/// Use case for validating, placing and recording a single order.
///
/// Every call writes exactly one trade row, whatever the outcome. A failed
/// ledger write is logged and does not change the response.
pub struct SubmitOrderUseCase<B, L>
where
    B: BrokerPort,
    L: LedgerPort,
{
    broker: Arc<B>,
    ledger: Arc<L>,
    broker_timeout: Duration,
}

impl<B, L> SubmitOrderUseCase<B, L>
where
    B: BrokerPort,
    L: LedgerPort,
{
    /// Create a new `SubmitOrderUseCase`.
    pub const fn new(broker: Arc<B>, ledger: Arc<L>, broker_timeout: Duration) -> Self {
        Self {
            broker,
            ledger,
            broker_timeout,
        }
    }

    /// Execute the use case.
    pub async fn execute(&self, request: SubmitOrderRequestDto) -> SubmitOrderResponseDto {
        let request_id = Uuid::new_v4();
        let order = &request.order;
        tracing::info!(
            %request_id,
            user_id = %request.user_id,
            symbol = %order.symbol,
            qty = %order.qty,
            side = %order.side,
            order_type = %order.order_type,
            "Order request received"
        );

        let response = match OrderTicket::from_draft(order) {
            Err(e) => {
                let message = e.to_string();
                self.record(rejected_trade(&request, &message)).await;
                failed(order, OrderErrorKind::Validation, message)
            }
            Ok(ticket) => match self.place(&ticket).await {
                Ok(placement) => {
                    self.record(placed_trade(&request, &ticket, &placement))
                        .await;
                    SubmitOrderResponseDto::Placed {
                        order_id: placement.broker_order_id,
                        order_status: placement.status,
                        symbol: ticket.symbol,
                        qty: order.qty.trim().to_string(),
                        side: ticket.side.as_str().to_string(),
                        filled_qty: placement.filled_qty,
                    }
                }
                Err(e) => {
                    let message = e.to_string();
                    self.record(rejected_trade(&request, &message)).await;
                    failed(order, OrderErrorKind::from(&e), message)
                }
            },
        };

        match &response {
            SubmitOrderResponseDto::Placed {
                order_id,
                order_status,
                ..
            } => tracing::info!(
                %request_id,
                user_id = %request.user_id,
                outcome = "placed",
                %order_id,
                %order_status,
                "Order response sent"
            ),
            SubmitOrderResponseDto::Failed { kind, message, .. } => tracing::warn!(
                %request_id,
                user_id = %request.user_id,
                outcome = kind.as_str(),
                error = %message,
                "Order response sent"
            ),
        }

        response
    }

    /// Call the broker, treating a missed deadline as transient.
    async fn place(&self, ticket: &OrderTicket) -> Result<Placement, BrokerError> {
        tokio::time::timeout(self.broker_timeout, self.broker.place_order(ticket))
            .await
            .unwrap_or_else(|_| {
                Err(BrokerError::Transient {
                    message: format!(
                        "no response within {}ms",
                        self.broker_timeout.as_millis()
                    ),
                })
            })
    }

    async fn record(&self, trade: NewTrade) {
        let order_id = trade.order_id.clone();
        if let Err(e) = self.ledger.log_trade(trade).await {
            tracing::error!(%order_id, error = %e, "Failed to record trade");
        }
    }
}

/// Failure response echoing the order fields as received.
fn failed(order: &OrderDraft, kind: OrderErrorKind, message: String) -> SubmitOrderResponseDto {
    SubmitOrderResponseDto::Failed {
        kind,
        message,
        symbol: order.symbol.trim().to_string(),
        qty: order.qty.trim().to_string(),
        side: order.side.trim().to_string(),
    }
}

fn trimmed(raw: Option<&String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Trade row for an order that was never placed; request fields are copied as received.
fn rejected_trade(request: &SubmitOrderRequestDto, reason: &str) -> NewTrade {
    let order = &request.order;
    NewTrade {
        strategy_id: None,
        user_id: request.user_id.clone(),
        order_id: String::new(),
        symbol: order.symbol.trim().to_string(),
        qty: order.qty.trim().to_string(),
        side: order.side.trim().to_string(),
        order_type: order.order_type.trim().to_string(),
        time_in_force: order.time_in_force.trim().to_string(),
        limit_price: trimmed(order.limit_price.as_ref()),
        stop_price: trimmed(order.stop_price.as_ref()),
        filled_qty: "0".to_string(),
        filled_avg_price: None,
        order_status: REJECTED_STATUS.to_string(),
        submitted_at: Utc::now(),
        filled_at: None,
        error_message: Some(reason.to_string()),
    }
}

fn placed_trade(
    request: &SubmitOrderRequestDto,
    ticket: &OrderTicket,
    placement: &Placement,
) -> NewTrade {
    let order = &request.order;
    NewTrade {
        strategy_id: None,
        user_id: request.user_id.clone(),
        order_id: placement.broker_order_id.clone(),
        symbol: ticket.symbol.clone(),
        qty: order.qty.trim().to_string(),
        side: ticket.side.as_str().to_string(),
        order_type: ticket.kind.order_type().as_str().to_string(),
        time_in_force: ticket.time_in_force.as_str().to_string(),
        limit_price: ticket
            .kind
            .limit_price()
            .and_then(|_| trimmed(order.limit_price.as_ref())),
        stop_price: ticket
            .kind
            .stop_price()
            .and_then(|_| trimmed(order.stop_price.as_ref())),
        filled_qty: placement.filled_qty.clone(),
        filled_avg_price: placement.filled_avg_price.clone(),
        order_status: placement.status.clone(),
        submitted_at: Utc::now(),
        filled_at: placement.filled_at,
        error_message: None,
    }
}
