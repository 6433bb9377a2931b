//! Ledger Port (Driven Port)
//!
//! Durable record of strategies, trades and positions.

use async_trait::async_trait;

use crate::domain::{
    FillUpdate, NewStrategy, NewTrade, Position, PositionUpdate, Strategy, StrategyStatus, Trade,
};

/// Ledger error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// The store rejected or failed the statement.
    #[error("ledger storage error: {0}")]
    Storage(String),

    /// A stored row could not be decoded.
    #[error("ledger row is corrupt: {0}")]
    Corrupt(String),

    /// The blocking worker running the statement died.
    #[error("ledger worker failed: {0}")]
    Worker(String),

    /// No trade carries the order id.
    #[error("no trade with order_id '{order_id}'")]
    TradeNotFound {
        /// The missing order id.
        order_id: String,
    },

    /// No strategy has the id.
    #[error("no strategy with id {id}")]
    StrategyNotFound {
        /// The missing strategy id.
        id: i64,
    },

    /// A uniqueness or foreign key constraint refused the write.
    #[error("ledger constraint violated: {0}")]
    Conflict(String),

    /// The ledger was closed.
    #[error("ledger is closed")]
    Closed,
}

/// Port for ledger reads and writes.
///
/// Every write is durable once the returned future resolves.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerPort: Send + Sync {
    /// Insert a trade row and return its id.
    async fn log_trade(&self, trade: NewTrade) -> Result<i64, LedgerError>;

    /// Apply a fill confirmation to the trade with `update.order_id`.
    async fn update_trade_status(&self, update: FillUpdate) -> Result<(), LedgerError>;

    /// Most recent trades for a user, newest first.
    async fn trades_by_user(&self, user_id: &str, limit: u32) -> Result<Vec<Trade>, LedgerError>;

    /// Register a strategy and return its id.
    async fn create_strategy(&self, strategy: NewStrategy) -> Result<i64, LedgerError>;

    /// Look a strategy up by id.
    async fn strategy_by_id(&self, id: i64) -> Result<Option<Strategy>, LedgerError>;

    /// Change a strategy's deployment status.
    async fn update_strategy_status(
        &self,
        id: i64,
        status: StrategyStatus,
    ) -> Result<(), LedgerError>;

    /// Delete a strategy. Its trades are kept with `strategy_id` cleared;
    /// its positions are deleted.
    async fn delete_strategy(&self, id: i64) -> Result<(), LedgerError>;

    /// Insert or replace the position for `(strategy_id, symbol)`.
    async fn upsert_position(&self, position: PositionUpdate) -> Result<i64, LedgerError>;

    /// All positions held by a strategy, ordered by symbol.
    async fn positions_by_strategy(&self, strategy_id: i64) -> Result<Vec<Position>, LedgerError>;
}
