use thiserror::Error;

/// Failures that can occur while constructing or decoding a wire type.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A candle's OHLC fields violate `low <= open,close <= high` or `low <= high`.
    #[error("invalid candle bounds: open={open} high={high} low={low} close={close}")]
    InvalidCandleBounds {
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    },

    /// A candle was finalized with zero contributing ticks.
    #[error("candle has tick_count=0, at least one contribution is required")]
    EmptyCandle,

    /// Volume was negative.
    #[error("negative volume: {0}")]
    NegativeVolume(f64),

    /// JSON payload failed to parse or was missing a required field.
    #[error("payload decode failed: {0}")]
    Decode(#[from] serde_json::Error),

    /// An unrecognized timeframe tag was encountered.
    #[error("unknown timeframe tag: {0}")]
    UnknownTimeframe(String),
}
