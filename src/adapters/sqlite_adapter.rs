//! SQLite strategy store and price history.
//!
//! Decimals are stored as TEXT so prices round-trip exactly.

use crate::domain::candle::PriceTick;
use crate::domain::error::EngineError;
use crate::domain::settings::EngineSettings;
use crate::domain::strategy::{Side, Strategy};
use crate::ports::price_port::PriceHistoryPort;
use crate::ports::strategy_store::StrategyStore;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use rust_decimal::Decimal;
use std::str::FromStr;

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn query_error(e: rusqlite::Error) -> EngineError {
    EngineError::StorageQuery {
        reason: e.to_string(),
    }
}

fn decimal_column(row: &rusqlite::Row<'_>, index: usize) -> rusqlite::Result<Decimal> {
    let text: String = row.get(index)?;
    Decimal::from_str(&text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn strategy_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Strategy> {
    let code: i64 = row.get(3)?;
    let side = Side::from_code(code).ok_or_else(|| {
        rusqlite::Error::IntegralValueOutOfRange(3, code)
    })?;
    Ok(Strategy {
        user_id: row.get(0)?,
        symbol: row.get(1)?,
        expression: row.get(2)?,
        side,
        repeat: row.get(4)?,
    })
}

impl SqliteAdapter {
    pub fn from_settings(settings: &EngineSettings) -> Result<Self, EngineError> {
        let db_path = settings.require_sqlite_path()?;
        let manager = SqliteConnectionManager::file(db_path);
        let pool = Pool::builder()
            .max_size(settings.pool_size)
            .build(manager)
            .map_err(|e: r2d2::Error| EngineError::Storage {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, EngineError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| EngineError::Storage {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, EngineError> {
        self.pool.get().map_err(|e: r2d2::Error| EngineError::Storage {
            reason: e.to_string(),
        })
    }

    pub fn initialize_schema(&self) -> Result<(), EngineError> {
        let conn = self.conn()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS user_stock (
                user_id TEXT NOT NULL,
                symbol TEXT NOT NULL,
                expression TEXT NOT NULL,
                side INTEGER NOT NULL,
                repeat INTEGER NOT NULL,
                PRIMARY KEY (user_id, symbol, side)
            );
            CREATE INDEX IF NOT EXISTS idx_user_stock_symbol ON user_stock(symbol);
            CREATE TABLE IF NOT EXISTS price (
                symbol TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                open TEXT NOT NULL,
                close TEXT NOT NULL,
                high TEXT NOT NULL,
                low TEXT NOT NULL,
                volume TEXT NOT NULL,
                PRIMARY KEY (symbol, timestamp)
            );",
        )
        .map_err(query_error)?;

        Ok(())
    }

    pub fn insert_ticks(&self, ticks: &[PriceTick]) -> Result<(), EngineError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_error)?;

        for tick in ticks {
            tx.execute(
                "INSERT OR REPLACE INTO price (symbol, timestamp, open, close, high, low, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    tick.symbol,
                    tick.timestamp,
                    tick.open.to_string(),
                    tick.close.to_string(),
                    tick.high.to_string(),
                    tick.low.to_string(),
                    tick.volume.to_string()
                ],
            )
            .map_err(query_error)?;
        }

        tx.commit().map_err(query_error)?;
        Ok(())
    }

    fn select_strategies(
        &self,
        query: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<Strategy>, EngineError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(query).map_err(query_error)?;
        let rows = stmt.query_map(params, strategy_row).map_err(query_error)?;

        let mut strategies = Vec::new();
        for row in rows {
            strategies.push(row.map_err(query_error)?);
        }
        Ok(strategies)
    }
}

impl StrategyStore for SqliteAdapter {
    fn upsert(&self, strategy: &Strategy) -> Result<(), EngineError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO user_stock (user_id, symbol, expression, side, repeat)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (user_id, symbol, side)
             DO UPDATE SET expression = excluded.expression, repeat = excluded.repeat",
            params![
                strategy.user_id,
                strategy.symbol,
                strategy.expression,
                strategy.side.code(),
                strategy.repeat
            ],
        )
        .map_err(query_error)?;
        Ok(())
    }

    fn delete(&self, user_id: &str, symbol: &str, side: Side) -> Result<bool, EngineError> {
        let conn = self.conn()?;
        let removed = conn
            .execute(
                "DELETE FROM user_stock WHERE user_id = ?1 AND symbol = ?2 AND side = ?3",
                params![user_id, symbol, side.code()],
            )
            .map_err(query_error)?;
        Ok(removed > 0)
    }

    fn select_all(&self) -> Result<Vec<Strategy>, EngineError> {
        self.select_strategies(
            "SELECT user_id, symbol, expression, side, repeat
             FROM user_stock ORDER BY symbol, user_id, side",
            &[],
        )
    }

    fn select_by_symbol(&self, symbol: &str) -> Result<Vec<Strategy>, EngineError> {
        self.select_strategies(
            "SELECT user_id, symbol, expression, side, repeat
             FROM user_stock WHERE symbol = ?1 ORDER BY user_id, side",
            &[&symbol],
        )
    }
}

impl PriceHistoryPort for SqliteAdapter {
    fn fetch_history(&self, symbol: &str, from: i64) -> Result<Vec<PriceTick>, EngineError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT symbol, timestamp, open, close, high, low, volume
                 FROM price
                 WHERE symbol = ?1 AND timestamp >= ?2
                 ORDER BY timestamp ASC",
            )
            .map_err(query_error)?;

        let rows = stmt
            .query_map(params![symbol, from], |row| {
                Ok(PriceTick {
                    symbol: row.get(0)?,
                    timestamp: row.get(1)?,
                    open: decimal_column(row, 2)?,
                    close: decimal_column(row, 3)?,
                    high: decimal_column(row, 4)?,
                    low: decimal_column(row, 5)?,
                    volume: decimal_column(row, 6)?,
                })
            })
            .map_err(query_error)?;

        let mut ticks = Vec::new();
        for row in rows {
            ticks.push(row.map_err(query_error)?);
        }
        Ok(ticks)
    }
}
