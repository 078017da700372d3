use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Candle, SchemaError, Timeframe};
use sqlx::{PgPool, Row};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WarmStartError {
    #[error("warm-start query failed: {0}")]
    Query(#[from] sqlx::Error),

    #[error("warm-start row violated candle invariants: {0}")]
    Schema(#[from] SchemaError),
}

/// Storage contract used only to seed a stateful node's buffer at startup.
/// Later events rely entirely on live bus traffic.
#[async_trait]
pub trait WarmStartStore: Send + Sync {
    /// Fetch up to `limit` of the most recent candles for `(symbol,
    /// timeframe)`, in chronological order.
    async fn load_recent_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: i64,
    ) -> Result<Vec<Candle>, WarmStartError>;
}

/// TimescaleDB/Postgres-backed [`WarmStartStore`]: a bounded, time-descending
/// query against a `(symbol, timeframe, time)`-keyed candle table, reversed
/// to chronological order before returning.
pub struct PgWarmStartStore {
    pool: PgPool,
}

impl PgWarmStartStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl WarmStartStore for PgWarmStartStore {
    async fn load_recent_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: i64,
    ) -> Result<Vec<Candle>, WarmStartError> {
        let rows = sqlx::query(
            r#"
            SELECT time, open, high, low, close, volume, tick_count
            FROM candles
            WHERE symbol = $1 AND timeframe = $2
            ORDER BY time DESC
            LIMIT $3
            "#,
        )
        .bind(symbol)
        .bind(timeframe.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut candles = Vec::with_capacity(rows.len());
        for row in &rows {
            let time: DateTime<Utc> = row.try_get("time")?;
            let open: f64 = row.try_get("open")?;
            let high: f64 = row.try_get("high")?;
            let low: f64 = row.try_get("low")?;
            let close: f64 = row.try_get("close")?;
            let volume: f64 = row.try_get("volume")?;
            let tick_count: i32 = row.try_get("tick_count")?;
            candles.push(Candle::new(
                symbol,
                time,
                timeframe,
                open,
                high,
                low,
                close,
                volume,
                tick_count as u32,
            )?);
        }
        // descending by time -> reverse to chronological order.
        candles.reverse();
        Ok(candles)
    }
}
