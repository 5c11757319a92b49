pub mod analyses;
pub mod markets;
pub mod models;
pub mod settings;
pub mod traders;
pub mod trades;
pub mod watchlist;

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::info;

use crate::error::Result;

/// Idempotent schema. Foreign keys are declared but not enforced: trades may
/// arrive before their trader row exists.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS traders (
        address      TEXT PRIMARY KEY,
        username     TEXT,
        win_rate     REAL NOT NULL DEFAULT 0,
        profit_loss  REAL NOT NULL DEFAULT 0,
        roi          REAL NOT NULL DEFAULT 0,
        volume       REAL NOT NULL DEFAULT 0,
        last_scanned INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS markets (
        id          TEXT PRIMARY KEY,
        question    TEXT NOT NULL,
        description TEXT,
        category    TEXT,
        ends_at     INTEGER,
        status      TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS trades (
        id        TEXT PRIMARY KEY,
        trader_id TEXT NOT NULL REFERENCES traders(address),
        market_id TEXT NOT NULL REFERENCES markets(id),
        type      TEXT NOT NULL,
        side      TEXT NOT NULL,
        price     REAL NOT NULL,
        size      REAL NOT NULL,
        timestamp INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_trades_trader ON trades(trader_id, timestamp)",
    r#"
    CREATE TABLE IF NOT EXISTS market_snapshots (
        id        INTEGER PRIMARY KEY AUTOINCREMENT,
        market_id TEXT NOT NULL REFERENCES markets(id),
        yes_price REAL NOT NULL,
        no_price  REAL NOT NULL,
        timestamp INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_snapshots_market ON market_snapshots(market_id, timestamp)",
    r#"
    CREATE TABLE IF NOT EXISTS analyses (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        trader_id  TEXT NOT NULL REFERENCES traders(address),
        thesis     TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_analyses_trader ON analyses(trader_id, created_at)",
    r#"
    CREATE TABLE IF NOT EXISTS watchlist (
        trader_id  TEXT PRIMARY KEY REFERENCES traders(address),
        notes      TEXT NOT NULL DEFAULT '',
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS settings (
        key   TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )
    "#,
];

/// Handle to the embedded store. Cheap to clone; clones share the pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if missing) the database file and ensure the schema exists.
    pub async fn open(path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{path}"))?
            .create_if_missing(true)
            .foreign_keys(false);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        let db = Self { pool };
        db.migrate().await?;
        info!(path, "Database ready");
        Ok(db)
    }

    /// Private in-memory database. One connection, kept alive for the pool's lifetime.
    #[cfg(test)]
    pub async fn open_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(false);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    pub async fn migrate(&self) -> Result<()> {
        for stmt in SCHEMA {
            sqlx::query(stmt).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

// ---------------------------------------------------------------------------
// Timestamp encoding: INTEGER unix milliseconds
// ---------------------------------------------------------------------------

pub(crate) fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{DateTime, TimeZone, Utc};

    use super::Database;
    use crate::types::{Trade, TradeType, Outcome, Trader};

    pub async fn db() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    pub fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    pub fn trader(address: &str, pnl: f64) -> Trader {
        Trader {
            address: address.to_string(),
            username: None,
            win_rate: 0.5,
            profit_loss: pnl,
            roi: 0.1,
            volume: 1000.0,
            last_scanned: ts(0),
        }
    }

    pub fn trade(id: &str, trader: &str, market: &str, secs: i64) -> Trade {
        Trade {
            id: id.to_string(),
            trader_address: trader.to_string(),
            market_id: market.to_string(),
            trade_type: TradeType::Buy,
            side: Outcome::Yes,
            price: 0.5,
            size: 100.0,
            timestamp: ts(secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn migrate_is_idempotent() {
        let db = Database::open_in_memory().await.unwrap();
        db.migrate().await.unwrap();
        db.migrate().await.unwrap();
    }

    #[tokio::test]
    async fn open_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        db.close().await;
        assert!(path.exists());

        // Reopen runs the schema again against existing tables.
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        db.close().await;
    }

    #[test]
    fn millis_round_trip() {
        let now = DateTime::from_timestamp_millis(1_700_000_123_456).unwrap();
        assert_eq!(from_millis(to_millis(now)), now);
    }
}
