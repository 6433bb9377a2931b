//! Domain layer: order validation and ledger records.
//!
//! No I/O happens here.

pub mod ledger;
pub mod order;

pub use ledger::{
    FillUpdate, NewStrategy, NewTrade, Position, PositionUpdate, REJECTED_STATUS, Strategy,
    StrategyStatus, Trade,
};
pub use order::{
    OrderDraft, OrderKind, OrderSide, OrderTicket, OrderType, TimeInForce, ValidationError,
};
