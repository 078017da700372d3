use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SchemaError;
use crate::timeframe::Timeframe;
use crate::Symbol;

/// A completed, immutable OHLCV candle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub symbol: Symbol,
    /// Candle open time, aligned to the timeframe's width.
    pub timestamp: DateTime<Utc>,
    pub timeframe: Timeframe,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub tick_count: u32,
}

impl Candle {
    /// Construct a candle, validating the OHLC/volume/tick_count invariants.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: impl Into<Symbol>,
        timestamp: DateTime<Utc>,
        timeframe: Timeframe,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
        tick_count: u32,
    ) -> Result<Self, SchemaError> {
        if low > high || low > open || low > close || high < open || high < close {
            return Err(SchemaError::InvalidCandleBounds {
                open,
                high,
                low,
                close,
            });
        }
        if volume < 0.0 {
            return Err(SchemaError::NegativeVolume(volume));
        }
        if tick_count == 0 {
            return Err(SchemaError::EmptyCandle);
        }
        Ok(Self {
            symbol: symbol.into(),
            timestamp,
            timeframe,
            open,
            high,
            low,
            close,
            volume,
            tick_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-01-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn rejects_inverted_bounds() {
        let err = Candle::new("AAPL", ts(), Timeframe::M1, 100.0, 99.0, 98.0, 100.0, 1.0, 1);
        assert!(matches!(err, Err(SchemaError::InvalidCandleBounds { .. })));
    }

    #[test]
    fn rejects_zero_tick_count() {
        let err = Candle::new("AAPL", ts(), Timeframe::M1, 100.0, 101.0, 99.0, 100.0, 1.0, 0);
        assert!(matches!(err, Err(SchemaError::EmptyCandle)));
    }

    #[test]
    fn json_round_trip() {
        use pretty_assertions::assert_eq;

        let c = Candle::new("AAPL", ts(), Timeframe::M1, 100.0, 101.0, 99.0, 99.5, 4.0, 3).unwrap();
        let encoded = serde_json::to_string(&c).unwrap();
        let decoded: Candle = serde_json::from_str(&encoded).unwrap();
        assert_eq!(c, decoded);
    }
}
