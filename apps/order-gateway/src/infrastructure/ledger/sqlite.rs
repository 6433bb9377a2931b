//! SQLite trade ledger.
//!
//! One connection behind a mutex; statements run on the blocking pool so the
//! async runtime never waits on disk.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params};

use crate::application::ports::{LedgerError, LedgerPort};
use crate::domain::{
    FillUpdate, NewStrategy, NewTrade, Position, PositionUpdate, Strategy, StrategyStatus, Trade,
};

use super::schema::SCHEMA;

const TRADE_COLUMNS: &str = "id, strategy_id, user_id, order_id, symbol, qty, side, order_type, \
     time_in_force, limit_price, stop_price, filled_qty, filled_avg_price, order_status, \
     submitted_at, filled_at, error_message";

const STRATEGY_COLUMNS: &str = "id, user_id, name, file_path, status, created_at, updated_at";

const POSITION_COLUMNS: &str = "id, strategy_id, user_id, symbol, qty, avg_entry_price, \
     current_price, market_value, unrealized_pl, updated_at";

/// SQLite implementation of [`LedgerPort`].
///
/// Opened once at startup and closed at shutdown. Clones share the same
/// connection.
#[derive(Debug, Clone)]
pub struct SqliteLedger {
    conn: Arc<Mutex<Option<Connection>>>,
}

impl SqliteLedger {
    /// Open or create the ledger file and apply the schema.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened or the schema cannot be applied.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                LedgerError::Storage(format!("cannot create {}: {e}", parent.display()))
            })?;
        }
        let ledger = Self::init(Connection::open(path)?)?;
        tracing::info!(path = %path.display(), "Ledger opened");
        Ok(ledger)
    }

    /// Open a private in-memory ledger.
    ///
    /// # Errors
    ///
    /// Fails if the schema cannot be applied.
    pub fn open_in_memory() -> Result<Self, LedgerError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, LedgerError> {
        // In-memory databases answer `memory` here instead of `wal`.
        let journal: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        conn.execute_batch("PRAGMA synchronous = FULL; PRAGMA foreign_keys = ON;")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA)?;
        tracing::debug!(%journal, "Ledger schema ready");
        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
        })
    }

    /// Close the connection. Later calls on any clone fail with
    /// [`LedgerError::Closed`].
    ///
    /// # Errors
    ///
    /// Fails if SQLite cannot finalize the connection.
    pub fn close(&self) -> Result<(), LedgerError> {
        let Some(conn) = self.conn.lock().take() else {
            return Ok(());
        };
        conn.close().map_err(|(_, e)| LedgerError::from(e))?;
        tracing::info!("Ledger closed");
        Ok(())
    }

    async fn run<T, F>(&self, op: F) -> Result<T, LedgerError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, LedgerError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock();
            let conn = guard.as_ref().ok_or(LedgerError::Closed)?;
            op(conn)
        })
        .await
        .map_err(|e| LedgerError::Worker(e.to_string()))?
    }
}

#[async_trait]
impl LedgerPort for SqliteLedger {
    async fn log_trade(&self, trade: NewTrade) -> Result<i64, LedgerError> {
        let id = self
            .run(move |conn| {
                conn.execute(
                    "INSERT INTO trades (
                        strategy_id, user_id, order_id, symbol, qty, side, order_type,
                        time_in_force, limit_price, stop_price, filled_qty, filled_avg_price,
                        order_status, submitted_at, filled_at, error_message
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                    params![
                        trade.strategy_id,
                        trade.user_id,
                        trade.order_id,
                        trade.symbol,
                        trade.qty,
                        trade.side,
                        trade.order_type,
                        trade.time_in_force,
                        trade.limit_price,
                        trade.stop_price,
                        trade.filled_qty,
                        trade.filled_avg_price,
                        trade.order_status,
                        to_text(&trade.submitted_at),
                        trade.filled_at.as_ref().map(to_text),
                        trade.error_message,
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        tracing::debug!(trade_id = id, "Trade logged");
        Ok(id)
    }

    async fn update_trade_status(&self, update: FillUpdate) -> Result<(), LedgerError> {
        self.run(move |conn| {
            let changed = conn.execute(
                "UPDATE trades
                 SET order_status = ?1, filled_qty = ?2, filled_avg_price = ?3, filled_at = ?4
                 WHERE order_id = ?5 AND order_id != ''",
                params![
                    update.order_status,
                    update.filled_qty,
                    update.filled_avg_price,
                    update.filled_at.as_ref().map(to_text),
                    update.order_id,
                ],
            )?;
            if changed == 0 {
                return Err(LedgerError::TradeNotFound {
                    order_id: update.order_id,
                });
            }
            Ok(())
        })
        .await
    }

    async fn trades_by_user(&self, user_id: &str, limit: u32) -> Result<Vec<Trade>, LedgerError> {
        let user_id = user_id.to_string();
        self.run(move |conn| {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT {TRADE_COLUMNS} FROM trades
                 WHERE user_id = ?1
                 ORDER BY submitted_at DESC, id DESC
                 LIMIT ?2"
            ))?;
            let trades = stmt
                .query_map(params![user_id, limit], trade_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(trades)
        })
        .await
    }

    async fn create_strategy(&self, strategy: NewStrategy) -> Result<i64, LedgerError> {
        self.run(move |conn| {
            let now = to_text(&Utc::now());
            conn.execute(
                "INSERT INTO strategies (user_id, name, file_path, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![
                    strategy.user_id,
                    strategy.name,
                    strategy.file_path,
                    strategy.status.as_str(),
                    now,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn strategy_by_id(&self, id: i64) -> Result<Option<Strategy>, LedgerError> {
        self.run(move |conn| {
            let strategy = conn
                .query_row(
                    &format!("SELECT {STRATEGY_COLUMNS} FROM strategies WHERE id = ?1"),
                    params![id],
                    strategy_from_row,
                )
                .optional()?;
            Ok(strategy)
        })
        .await
    }

    async fn update_strategy_status(
        &self,
        id: i64,
        status: StrategyStatus,
    ) -> Result<(), LedgerError> {
        self.run(move |conn| {
            let changed = conn.execute(
                "UPDATE strategies SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.as_str(), to_text(&Utc::now()), id],
            )?;
            if changed == 0 {
                return Err(LedgerError::StrategyNotFound { id });
            }
            Ok(())
        })
        .await
    }

    async fn delete_strategy(&self, id: i64) -> Result<(), LedgerError> {
        self.run(move |conn| {
            let changed = conn.execute("DELETE FROM strategies WHERE id = ?1", params![id])?;
            if changed == 0 {
                return Err(LedgerError::StrategyNotFound { id });
            }
            Ok(())
        })
        .await
    }

    async fn upsert_position(&self, position: PositionUpdate) -> Result<i64, LedgerError> {
        self.run(move |conn| {
            let id = conn.query_row(
                "INSERT INTO positions (
                    strategy_id, user_id, symbol, qty, avg_entry_price,
                    current_price, market_value, unrealized_pl, updated_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT (strategy_id, symbol) DO UPDATE SET
                    user_id = excluded.user_id,
                    qty = excluded.qty,
                    avg_entry_price = excluded.avg_entry_price,
                    current_price = excluded.current_price,
                    market_value = excluded.market_value,
                    unrealized_pl = excluded.unrealized_pl,
                    updated_at = excluded.updated_at
                 RETURNING id",
                params![
                    position.strategy_id,
                    position.user_id,
                    position.symbol,
                    position.qty,
                    position.avg_entry_price,
                    position.current_price,
                    position.market_value,
                    position.unrealized_pl,
                    to_text(&Utc::now()),
                ],
                |row| row.get(0),
            )?;
            Ok(id)
        })
        .await
    }

    async fn positions_by_strategy(&self, strategy_id: i64) -> Result<Vec<Position>, LedgerError> {
        self.run(move |conn| {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT {POSITION_COLUMNS} FROM positions
                 WHERE strategy_id = ?1
                 ORDER BY symbol"
            ))?;
            let positions = stmt
                .query_map(params![strategy_id], position_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(positions)
        })
        .await
    }
}

impl From<rusqlite::Error> for LedgerError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation => {
                Self::Conflict(err.to_string())
            }
            rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::InvalidColumnType(..) => Self::Corrupt(err.to_string()),
            _ => Self::Storage(err.to_string()),
        }
    }
}

// ============================================================================
// Row Mapping
// ============================================================================

/// Fixed-width RFC 3339 so text order matches time order.
fn to_text(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw, idx)
}

fn optional_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| parse_timestamp(&raw, idx)).transpose()
}

fn parse_timestamp(raw: &str, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn trade_from_row(row: &Row<'_>) -> rusqlite::Result<Trade> {
    Ok(Trade {
        id: row.get(0)?,
        strategy_id: row.get(1)?,
        user_id: row.get(2)?,
        order_id: row.get(3)?,
        symbol: row.get(4)?,
        qty: row.get(5)?,
        side: row.get(6)?,
        order_type: row.get(7)?,
        time_in_force: row.get(8)?,
        limit_price: row.get(9)?,
        stop_price: row.get(10)?,
        filled_qty: row.get(11)?,
        filled_avg_price: row.get(12)?,
        order_status: row.get(13)?,
        submitted_at: timestamp(row, 14)?,
        filled_at: optional_timestamp(row, 15)?,
        error_message: row.get(16)?,
    })
}

fn strategy_from_row(row: &Row<'_>) -> rusqlite::Result<Strategy> {
    let status: String = row.get(4)?;
    let status = status
        .parse::<StrategyStatus>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, e.into()))?;
    Ok(Strategy {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        file_path: row.get(3)?,
        status,
        created_at: timestamp(row, 5)?,
        updated_at: timestamp(row, 6)?,
    })
}

fn position_from_row(row: &Row<'_>) -> rusqlite::Result<Position> {
    Ok(Position {
        id: row.get(0)?,
        strategy_id: row.get(1)?,
        user_id: row.get(2)?,
        symbol: row.get(3)?,
        qty: row.get(4)?,
        avg_entry_price: row.get(5)?,
        current_price: row.get(6)?,
        market_value: row.get(7)?,
        unrealized_pl: row.get(8)?,
        updated_at: timestamp(row, 9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::REJECTED_STATUS;
    use chrono::Duration;

    fn trade(user_id: &str, order_id: &str, qty: &str) -> NewTrade {
        NewTrade {
            strategy_id: None,
            user_id: user_id.to_string(),
            order_id: order_id.to_string(),
            symbol: "AAPL".to_string(),
            qty: qty.to_string(),
            side: "buy".to_string(),
            order_type: "market".to_string(),
            time_in_force: "day".to_string(),
            limit_price: None,
            stop_price: None,
            filled_qty: "0".to_string(),
            filled_avg_price: None,
            order_status: "accepted".to_string(),
            submitted_at: Utc::now(),
            filled_at: None,
            error_message: None,
        }
    }

    fn strategy(user_id: &str, name: &str) -> NewStrategy {
        NewStrategy {
            user_id: user_id.to_string(),
            name: name.to_string(),
            file_path: format!("strategies/{name}/strategy.py"),
            status: StrategyStatus::Stopped,
        }
    }

    fn position(strategy_id: i64, symbol: &str, qty: &str) -> PositionUpdate {
        PositionUpdate {
            strategy_id,
            user_id: "alice".to_string(),
            symbol: symbol.to_string(),
            qty: qty.to_string(),
            avg_entry_price: "100.00".to_string(),
            current_price: None,
            market_value: None,
            unrealized_pl: None,
        }
    }

    #[tokio::test]
    async fn trades_come_back_newest_first() {
        let ledger = SqliteLedger::open_in_memory().unwrap();
        let base = Utc::now();

        let mut older = trade("alice", "o-1", "1");
        older.submitted_at = base - Duration::seconds(10);
        let mut newer = trade("alice", "o-2", "2");
        newer.submitted_at = base;
        ledger.log_trade(newer).await.unwrap();
        ledger.log_trade(older).await.unwrap();
        ledger.log_trade(trade("bob", "o-3", "3")).await.unwrap();

        let trades = ledger.trades_by_user("alice", 10).await.unwrap();
        let ids: Vec<_> = trades.iter().map(|t| t.order_id.as_str()).collect();
        assert_eq!(ids, ["o-2", "o-1"]);

        let limited = ledger.trades_by_user("alice", 1).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn equal_timestamps_fall_back_to_id() {
        let ledger = SqliteLedger::open_in_memory().unwrap();
        let at = Utc::now();
        for order_id in ["a", "b", "c"] {
            let mut t = trade("alice", order_id, "1");
            t.submitted_at = at;
            ledger.log_trade(t).await.unwrap();
        }
        let trades = ledger.trades_by_user("alice", 10).await.unwrap();
        let ids: Vec<_> = trades.iter().map(|t| t.order_id.as_str()).collect();
        assert_eq!(ids, ["c", "b", "a"]);
    }

    #[tokio::test]
    async fn decimal_strings_are_stored_verbatim() {
        let ledger = SqliteLedger::open_in_memory().unwrap();
        let mut t = trade("alice", "o-1", "10.5");
        t.limit_price = Some("150.250".to_string());
        ledger.log_trade(t).await.unwrap();

        let stored = &ledger.trades_by_user("alice", 1).await.unwrap()[0];
        assert_eq!(stored.qty, "10.5");
        assert_eq!(stored.limit_price.as_deref(), Some("150.250"));
    }

    #[tokio::test]
    async fn rejected_trades_share_empty_order_id() {
        let ledger = SqliteLedger::open_in_memory().unwrap();
        for _ in 0..2 {
            let mut t = trade("alice", "", "-1");
            t.order_status = REJECTED_STATUS.to_string();
            t.error_message = Some("qty must be a positive decimal".to_string());
            ledger.log_trade(t).await.unwrap();
        }
        let trades = ledger.trades_by_user("alice", 10).await.unwrap();
        assert_eq!(trades.len(), 2);
        assert!(trades.iter().all(Trade::is_rejected));
    }

    #[tokio::test]
    async fn duplicate_order_id_is_a_conflict() {
        let ledger = SqliteLedger::open_in_memory().unwrap();
        ledger.log_trade(trade("alice", "o-1", "1")).await.unwrap();
        let err = ledger.log_trade(trade("alice", "o-1", "1")).await.unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(_)));
    }

    #[tokio::test]
    async fn fill_update_applies_to_matching_trade() {
        let ledger = SqliteLedger::open_in_memory().unwrap();
        ledger.log_trade(trade("alice", "o-1", "10")).await.unwrap();
        let filled_at = Utc::now();

        ledger
            .update_trade_status(FillUpdate {
                order_id: "o-1".to_string(),
                order_status: "filled".to_string(),
                filled_qty: "10".to_string(),
                filled_avg_price: Some("187.42".to_string()),
                filled_at: Some(filled_at),
            })
            .await
            .unwrap();

        let stored = &ledger.trades_by_user("alice", 1).await.unwrap()[0];
        assert_eq!(stored.order_status, "filled");
        assert_eq!(stored.filled_qty, "10");
        assert_eq!(stored.filled_avg_price.as_deref(), Some("187.42"));
        assert_eq!(
            stored.filled_at.map(|t| t.timestamp_micros()),
            Some(filled_at.timestamp_micros())
        );
    }

    #[tokio::test]
    async fn fill_update_for_unknown_order_fails() {
        let ledger = SqliteLedger::open_in_memory().unwrap();
        ledger.log_trade(trade("alice", "", "1")).await.unwrap();

        for order_id in ["missing", ""] {
            let err = ledger
                .update_trade_status(FillUpdate {
                    order_id: order_id.to_string(),
                    order_status: "filled".to_string(),
                    filled_qty: "1".to_string(),
                    filled_avg_price: None,
                    filled_at: None,
                })
                .await
                .unwrap_err();
            assert!(matches!(err, LedgerError::TradeNotFound { .. }));
        }
    }

    #[tokio::test]
    async fn strategy_lifecycle() {
        let ledger = SqliteLedger::open_in_memory().unwrap();
        let id = ledger
            .create_strategy(strategy("alice", "momentum"))
            .await
            .unwrap();

        let stored = ledger.strategy_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.name, "momentum");
        assert_eq!(stored.status, StrategyStatus::Stopped);

        ledger
            .update_strategy_status(id, StrategyStatus::Active)
            .await
            .unwrap();
        let stored = ledger.strategy_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.status, StrategyStatus::Active);
        assert!(stored.updated_at >= stored.created_at);

        ledger.delete_strategy(id).await.unwrap();
        assert!(ledger.strategy_by_id(id).await.unwrap().is_none());
        assert!(matches!(
            ledger.delete_strategy(id).await,
            Err(LedgerError::StrategyNotFound { .. })
        ));
        assert!(matches!(
            ledger
                .update_strategy_status(id, StrategyStatus::Paused)
                .await,
            Err(LedgerError::StrategyNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn strategy_name_is_unique_per_user() {
        let ledger = SqliteLedger::open_in_memory().unwrap();
        ledger
            .create_strategy(strategy("alice", "momentum"))
            .await
            .unwrap();
        ledger
            .create_strategy(strategy("bob", "momentum"))
            .await
            .unwrap();
        let err = ledger
            .create_strategy(strategy("alice", "momentum"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(_)));
    }

    #[tokio::test]
    async fn deleting_strategy_detaches_trades_and_drops_positions() {
        let ledger = SqliteLedger::open_in_memory().unwrap();
        let id = ledger
            .create_strategy(strategy("alice", "momentum"))
            .await
            .unwrap();
        let mut t = trade("alice", "o-1", "5");
        t.strategy_id = Some(id);
        ledger.log_trade(t).await.unwrap();
        ledger.upsert_position(position(id, "AAPL", "5")).await.unwrap();

        ledger.delete_strategy(id).await.unwrap();

        let trades = ledger.trades_by_user("alice", 10).await.unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].strategy_id, None);
        assert!(ledger.positions_by_strategy(id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn upsert_replaces_position_in_place() {
        let ledger = SqliteLedger::open_in_memory().unwrap();
        let id = ledger
            .create_strategy(strategy("alice", "momentum"))
            .await
            .unwrap();

        let first = ledger.upsert_position(position(id, "MSFT", "5")).await.unwrap();
        ledger.upsert_position(position(id, "AAPL", "1")).await.unwrap();
        let mut update = position(id, "MSFT", "7.5");
        update.current_price = Some("410.10".to_string());
        let second = ledger.upsert_position(update).await.unwrap();
        assert_eq!(first, second);

        let positions = ledger.positions_by_strategy(id).await.unwrap();
        let symbols: Vec<_> = positions.iter().map(|p| p.symbol.as_str()).collect();
        assert_eq!(symbols, ["AAPL", "MSFT"]);
        assert_eq!(positions[1].qty, "7.5");
        assert_eq!(positions[1].current_price.as_deref(), Some("410.10"));
    }

    #[tokio::test]
    async fn position_needs_existing_strategy() {
        let ledger = SqliteLedger::open_in_memory().unwrap();
        let err = ledger
            .upsert_position(position(42, "AAPL", "1"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(_)));
    }

    #[tokio::test]
    async fn writes_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ledger.db");

        let ledger = SqliteLedger::open(&path).unwrap();
        ledger.log_trade(trade("alice", "o-1", "10.5")).await.unwrap();
        ledger.close().unwrap();

        let reopened = SqliteLedger::open(&path).unwrap();
        let trades = reopened.trades_by_user("alice", 10).await.unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].qty, "10.5");
    }

    #[tokio::test]
    async fn closed_ledger_refuses_work() {
        let ledger = SqliteLedger::open_in_memory().unwrap();
        let clone = ledger.clone();
        ledger.close().unwrap();
        ledger.close().unwrap();

        let err = clone.trades_by_user("alice", 1).await.unwrap_err();
        assert_eq!(err, LedgerError::Closed);
    }
}
