//! HTTP/protobuf API adapter.
//!
//! Inbound adapter that decodes order requests and delegates to the submit
//! order use case.

mod controller;
mod proto;

pub use controller::{
    AppState, HealthResponse, PROTOBUF_CONTENT_TYPE, USER_ID_HEADER, create_router,
};
pub use proto::{OrderRequest, OrderResponse, STATUS_ERROR, STATUS_SUCCESS};
