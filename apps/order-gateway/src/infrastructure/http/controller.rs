//! HTTP Controller (Driver Adapter)
//!
//! Axum router exposing protobuf order submission to sandboxed strategies.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use prost::Message;
use serde::Serialize;

use crate::application::dto::{OrderErrorKind, SubmitOrderRequestDto, SubmitOrderResponseDto};
use crate::application::ports::{BrokerPort, LedgerPort};
use crate::application::use_cases::SubmitOrderUseCase;

use super::proto::{OrderRequest, OrderResponse};

/// Content type of order requests and responses.
pub const PROTOBUF_CONTENT_TYPE: &str = "application/x-protobuf";

/// Header carrying the user an order is attributed to.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Application state shared across handlers.
pub struct AppState<B, L>
where
    B: BrokerPort,
    L: LedgerPort,
{
    /// Use case for submitting orders.
    pub submit_order: Arc<SubmitOrderUseCase<B, L>>,
    /// Application version.
    pub version: String,
}

impl<B, L> Clone for AppState<B, L>
where
    B: BrokerPort,
    L: LedgerPort,
{
    fn clone(&self) -> Self {
        Self {
            submit_order: Arc::clone(&self.submit_order),
            version: self.version.clone(),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service version.
    pub version: String,
}

/// Create the HTTP router with all endpoints.
pub fn create_router<B, L>(state: AppState<B, L>) -> Router
where
    B: BrokerPort + 'static,
    L: LedgerPort + 'static,
{
    Router::new()
        .route("/health", get(health_check))
        .route("/order", post(submit_order))
        .with_state(state)
}

/// Health check endpoint.
async fn health_check<B, L>(State(state): State<AppState<B, L>>) -> impl IntoResponse
where
    B: BrokerPort,
    L: LedgerPort,
{
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
    })
}

/// Order submission endpoint.
async fn submit_order<B, L>(
    State(state): State<AppState<B, L>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    B: BrokerPort,
    L: LedgerPort,
{
    let user_id = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok());

    let request = match OrderRequest::decode(body) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(user_id = ?user_id, error = %e, "Rejected undecodable order request");
            return protobuf(
                StatusCode::BAD_REQUEST,
                &OrderResponse::error(
                    OrderErrorKind::Validation,
                    format!("invalid OrderRequest body: {e}"),
                ),
            );
        }
    };

    let dto = SubmitOrderRequestDto::new(user_id, request.into());
    let response = state.submit_order.execute(dto).await;
    let status = status_code(&response);
    protobuf(status, &OrderResponse::from(response))
}

const fn status_code(response: &SubmitOrderResponseDto) -> StatusCode {
    match response.error_kind() {
        None => StatusCode::CREATED,
        Some(OrderErrorKind::Validation) => StatusCode::BAD_REQUEST,
        Some(OrderErrorKind::Rejected) => StatusCode::UNPROCESSABLE_ENTITY,
        Some(OrderErrorKind::Transient) => StatusCode::BAD_GATEWAY,
    }
}

fn protobuf(status: StatusCode, message: &OrderResponse) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, PROTOBUF_CONTENT_TYPE)],
        message.encode_to_vec(),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::application::ports::{BrokerError, MockBrokerPort, Placement};
    use crate::infrastructure::ledger::SqliteLedger;

    fn app(broker: MockBrokerPort) -> (Router, SqliteLedger) {
        let ledger = SqliteLedger::open_in_memory().unwrap();
        let use_case = SubmitOrderUseCase::new(
            Arc::new(broker),
            Arc::new(ledger.clone()),
            Duration::from_secs(5),
        );
        let state = AppState {
            submit_order: Arc::new(use_case),
            version: "test".to_string(),
        };
        (create_router(state), ledger)
    }

    fn order_request(qty: &str) -> OrderRequest {
        OrderRequest {
            symbol: "AAPL".to_string(),
            qty: qty.to_string(),
            side: "buy".to_string(),
            order_type: "market".to_string(),
            time_in_force: "day".to_string(),
            limit_price: None,
            stop_price: None,
        }
    }

    fn post_order(body: Vec<u8>, user: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/order")
            .header(header::CONTENT_TYPE, PROTOBUF_CONTENT_TYPE);
        if let Some(user) = user {
            builder = builder.header(USER_ID_HEADER, user);
        }
        builder.body(Body::from(body)).unwrap()
    }

    async fn decode(response: Response) -> OrderResponse {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        OrderResponse::decode(bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_version() {
        let (router, _) = app(MockBrokerPort::new());
        let response = router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["version"], "test");
    }

    #[tokio::test]
    async fn placed_order_returns_created() {
        let mut broker = MockBrokerPort::new();
        broker.expect_place_order().times(1).returning(|_| {
            Ok(Placement {
                broker_order_id: "ord-9".to_string(),
                status: "accepted".to_string(),
                filled_qty: "0".to_string(),
                filled_avg_price: None,
                filled_at: None,
            })
        });
        let (router, ledger) = app(broker);

        let response = router
            .oneshot(post_order(order_request("10").encode_to_vec(), Some("alice")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            PROTOBUF_CONTENT_TYPE
        );
        let body = decode(response).await;
        assert_eq!(body.status, "success");
        assert_eq!(body.order_id, "ord-9");

        let trades = ledger.trades_by_user("alice", 10).await.unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].order_id, "ord-9");
    }

    #[tokio::test]
    async fn invalid_order_returns_bad_request() {
        let mut broker = MockBrokerPort::new();
        broker.expect_place_order().times(0);
        let (router, ledger) = app(broker);

        let response = router
            .oneshot(post_order(order_request("0").encode_to_vec(), None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = decode(response).await;
        assert_eq!(body.status, "error");
        assert_eq!(body.error_kind, "validation");

        let trades = ledger.trades_by_user("default_user", 10).await.unwrap();
        assert_eq!(trades.len(), 1);
        assert!(trades[0].is_rejected());
    }

    #[tokio::test]
    async fn broker_failures_map_to_status_codes() {
        for (error, expected) in [
            (
                BrokerError::Rejected {
                    message: "insufficient buying power".to_string(),
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                BrokerError::Transient {
                    message: "connection reset".to_string(),
                },
                StatusCode::BAD_GATEWAY,
            ),
        ] {
            let mut broker = MockBrokerPort::new();
            broker
                .expect_place_order()
                .times(1)
                .returning(move |_| Err(error.clone()));
            let (router, _) = app(broker);

            let response = router
                .oneshot(post_order(order_request("1").encode_to_vec(), None))
                .await
                .unwrap();
            assert_eq!(response.status(), expected);
        }
    }

    #[tokio::test]
    async fn failed_order_echoes_request_fields() {
        let mut broker = MockBrokerPort::new();
        broker.expect_place_order().times(1).returning(|_| {
            Err(BrokerError::Rejected {
                message: "insufficient buying power".to_string(),
            })
        });
        let (router, _) = app(broker);

        let response = router
            .oneshot(post_order(order_request("10").encode_to_vec(), Some("alice")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = decode(response).await;
        assert_eq!(body.status, "error");
        assert_eq!(body.symbol, "AAPL");
        assert_eq!(body.qty, "10");
        assert_eq!(body.side, "buy");
        assert_eq!(body.order_status, "rejected");
        assert_eq!(body.error_kind, "rejected");
        assert!(body.order_id.is_empty());
    }

    #[tokio::test]
    async fn garbage_body_is_bad_request_without_ledger_row() {
        let mut broker = MockBrokerPort::new();
        broker.expect_place_order().times(0);
        let (router, ledger) = app(broker);

        let response = router
            .oneshot(post_order(vec![0xff, 0xff, 0xff], Some("alice")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(decode(response).await.error_kind, "validation");
        assert!(ledger.trades_by_user("alice", 10).await.unwrap().is_empty());
    }
}
