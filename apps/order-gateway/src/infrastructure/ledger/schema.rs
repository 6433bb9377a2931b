//! Ledger schema.

/// Idempotent schema, created on open.
pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS strategies (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id     TEXT NOT NULL,
    name        TEXT NOT NULL,
    file_path   TEXT NOT NULL,
    status      TEXT NOT NULL DEFAULT 'stopped'
                CHECK (status IN ('active', 'paused', 'stopped')),
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    UNIQUE (user_id, name)
);

CREATE TABLE IF NOT EXISTS trades (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    strategy_id       INTEGER REFERENCES strategies(id) ON DELETE SET NULL,
    user_id           TEXT NOT NULL,
    order_id          TEXT NOT NULL DEFAULT '',
    symbol            TEXT NOT NULL,
    qty               TEXT NOT NULL,
    side              TEXT NOT NULL,
    order_type        TEXT NOT NULL,
    time_in_force     TEXT NOT NULL,
    limit_price       TEXT,
    stop_price        TEXT,
    filled_qty        TEXT NOT NULL DEFAULT '0',
    filled_avg_price  TEXT,
    order_status      TEXT NOT NULL,
    submitted_at      TEXT NOT NULL,
    filled_at         TEXT,
    error_message     TEXT
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_trades_order_id
    ON trades(order_id) WHERE order_id != '';
CREATE INDEX IF NOT EXISTS idx_trades_user_id ON trades(user_id);
CREATE INDEX IF NOT EXISTS idx_trades_strategy_id ON trades(strategy_id);
CREATE INDEX IF NOT EXISTS idx_trades_symbol ON trades(symbol);
CREATE INDEX IF NOT EXISTS idx_trades_submitted_at ON trades(submitted_at);

CREATE TABLE IF NOT EXISTS positions (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    strategy_id       INTEGER NOT NULL REFERENCES strategies(id) ON DELETE CASCADE,
    user_id           TEXT NOT NULL,
    symbol            TEXT NOT NULL,
    qty               TEXT NOT NULL,
    avg_entry_price   TEXT NOT NULL,
    current_price     TEXT,
    market_value      TEXT,
    unrealized_pl     TEXT,
    updated_at        TEXT NOT NULL,
    UNIQUE (strategy_id, symbol)
);

CREATE INDEX IF NOT EXISTS idx_positions_strategy_id ON positions(strategy_id);
CREATE INDEX IF NOT EXISTS idx_positions_user_id ON positions(user_id);
";
