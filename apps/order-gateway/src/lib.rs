// Allow unwrap/expect in tests - tests should panic on unexpected errors
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Order Gateway
//!
//! The single trusted intermediary between untrusted strategy sandboxes and
//! the brokerage. Strategies never see credentials; they send protobuf orders
//! here, and every order is validated, placed, and recorded exactly once.
//!
//! # Architecture (Hexagonal)
//!
//! - **Domain**: order validation and ledger records, no I/O
//!   - `order`: `OrderDraft` → `OrderTicket` validation, tagged `OrderKind`
//!   - `ledger`: strategies, trades, positions
//!
//! - **Application**: use cases and ports
//!   - `ports`: `BrokerPort`, `LedgerPort`
//!   - `use_cases`: `SubmitOrder`
//!   - `dto`: request and outcome types
//!
//! - **Infrastructure**: adapters
//!   - `broker`: Alpaca trading API
//!   - `ledger`: SQLite ledger
//!   - `http`: `POST /order` (protobuf) and `GET /health`
//!   - `config`: environment settings

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Hexagonal Layers
// =============================================================================

/// Domain layer - Order validation and ledger records.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

pub use application::dto::{OrderErrorKind, SubmitOrderRequestDto, SubmitOrderResponseDto};
pub use application::ports::{BrokerError, BrokerPort, LedgerError, LedgerPort, Placement};
pub use application::use_cases::SubmitOrderUseCase;
pub use domain::{OrderDraft, OrderKind, OrderTicket, ValidationError};
pub use infrastructure::ledger::SqliteLedger;
