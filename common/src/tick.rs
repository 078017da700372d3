use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Symbol;

/// A single raw tick from a market feed. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub symbol: Symbol,
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bid: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ask: Option<f64>,
}

impl Tick {
    #[must_use]
    pub fn new(symbol: impl Into<Symbol>, timestamp: DateTime<Utc>, price: f64) -> Self {
        Self {
            symbol: symbol.into(),
            timestamp,
            price,
            volume: None,
            bid: None,
            ask: None,
        }
    }

    #[must_use]
    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = Some(volume);
        self
    }

    #[must_use]
    pub fn with_quote(mut self, bid: f64, ask: f64) -> Self {
        self.bid = Some(bid);
        self.ask = Some(ask);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trip_preserves_optional_fields() {
        use pretty_assertions::assert_eq;

        let t = Tick::new("AAPL", Utc::now(), 100.5).with_volume(3.0);
        let encoded = serde_json::to_string(&t).unwrap();
        let decoded: Tick = serde_json::from_str(&encoded).unwrap();
        assert_eq!(t, decoded);
    }

    #[test]
    fn missing_optional_fields_default_to_none() {
        let json = r#"{"symbol":"AAPL","timestamp":"2024-01-01T00:00:00Z","price":1.0}"#;
        let t: Tick = serde_json::from_str(json).unwrap();
        assert_eq!(t.volume, None);
        assert_eq!(t.bid, None);
        assert_eq!(t.ask, None);
    }
}
