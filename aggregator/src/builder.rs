use chrono::{DateTime, Utc};
use common::{Candle, SchemaError, Symbol, Tick, Timeframe};

/// In-progress candle for one (symbol, timeframe). `open` is `None` until
/// the first contributing tick; becomes immutable once turned into a
/// [`Candle`] via [`CandleBuilder::finalize`].
#[derive(Debug, Clone)]
pub struct CandleBuilder {
    pub symbol: Symbol,
    pub timeframe: Timeframe,
    pub start: DateTime<Utc>,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    volume: f64,
    tick_count: u32,
}

impl CandleBuilder {
    #[must_use]
    pub fn new(symbol: Symbol, timeframe: Timeframe, start: DateTime<Utc>) -> Self {
        Self {
            symbol,
            timeframe,
            start,
            open: None,
            high: None,
            low: None,
            close: None,
            volume: 0.0,
            tick_count: 0,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.open.is_none()
    }

    /// Fold a tick in: first tick seeds open/high/low/close, subsequent
    /// ticks widen high/low and move close.
    pub fn add_tick(&mut self, tick: &Tick) {
        let price = tick.price;
        if self.open.is_none() {
            self.open = Some(price);
            self.high = Some(price);
            self.low = Some(price);
        }
        self.high = Some(self.high.unwrap().max(price));
        self.low = Some(self.low.unwrap().min(price));
        self.close = Some(price);
        self.volume += tick.volume.unwrap_or(0.0);
        self.tick_count += 1;
    }

    /// Turn a non-empty builder into an immutable [`Candle`]. Returns `None`
    /// for an empty builder (spec.md: only non-empty builders are finalized).
    #[must_use]
    pub fn finalize(&self) -> Option<Candle> {
        let (open, high, low, close) = (self.open?, self.high?, self.low?, self.close?);
        match Candle::new(
            self.symbol.clone(),
            self.start,
            self.timeframe,
            open,
            high,
            low,
            close,
            self.volume,
            self.tick_count,
        ) {
            Ok(candle) => Some(candle),
            Err(err) => {
                tracing::error!(symbol = %self.symbol, timeframe = %self.timeframe, error = %err, "built an invariant-violating candle");
                None
            }
        }
    }
}

/// The aligned start of the candle containing `timestamp` at `timeframe`'s
/// width: `floor(epoch_seconds / width) * width`, preserving the instant's
/// timezone (here always UTC, since [`Tick::timestamp`] is `DateTime<Utc>`).
#[must_use]
pub fn candle_start(timestamp: DateTime<Utc>, timeframe: Timeframe) -> DateTime<Utc> {
    let width = timeframe.width_secs();
    let aligned = timestamp.timestamp().div_euclid(width) * width;
    DateTime::from_timestamp(aligned, 0).expect("aligned timestamp is in range")
}

pub fn decode_tick(payload: &[u8]) -> Result<Tick, SchemaError> {
    serde_json::from_slice(payload).map_err(SchemaError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn alignment_rounds_down_to_width() {
        let start = candle_start(ts("2024-01-01T10:00:59Z"), Timeframe::M1);
        assert_eq!(start, ts("2024-01-01T10:00:00Z"));
    }

    #[test]
    fn first_tick_seeds_ohlc() {
        let mut builder = CandleBuilder::new("AAPL".into(), Timeframe::M1, ts("2024-01-01T10:00:00Z"));
        builder.add_tick(&Tick::new("AAPL", ts("2024-01-01T10:00:05Z"), 100.0).with_volume(1.0));
        let candle = builder.finalize().unwrap();
        assert_eq!((candle.open, candle.high, candle.low, candle.close), (100.0, 100.0, 100.0, 100.0));
        assert_eq!(candle.tick_count, 1);
    }

    #[test]
    fn scenario_1_minute_alignment() {
        use pretty_assertions::assert_eq;

        let start = ts("2024-01-01T10:00:00Z");
        let mut builder = CandleBuilder::new("ES".into(), Timeframe::M1, start);
        builder.add_tick(&Tick::new("ES", ts("2024-01-01T10:00:05Z"), 100.0).with_volume(1.0));
        builder.add_tick(&Tick::new("ES", ts("2024-01-01T10:00:30Z"), 101.0).with_volume(2.0));
        builder.add_tick(&Tick::new("ES", ts("2024-01-01T10:00:59Z"), 99.0).with_volume(1.0));
        let candle = builder.finalize().unwrap();
        let expected = Candle::new("ES", start, Timeframe::M1, 100.0, 101.0, 99.0, 99.0, 4.0, 3).unwrap();
        assert_eq!(candle, expected);
    }

    #[test]
    fn empty_builder_does_not_finalize() {
        let builder = CandleBuilder::new("AAPL".into(), Timeframe::M1, ts("2024-01-01T10:00:00Z"));
        assert!(builder.is_empty());
        assert!(builder.finalize().is_none());
    }
}

/// Property tests for alignment and fold arithmetic, per spec.md §8's
/// "Aggregator invariants (property tests)".
#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_timeframe() -> impl Strategy<Value = Timeframe> {
        (0usize..Timeframe::ALL.len()).prop_map(|i| Timeframe::ALL[i])
    }

    fn arb_price() -> impl Strategy<Value = f64> {
        1.0f64..10_000.0
    }

    fn arb_volume() -> impl Strategy<Value = f64> {
        0.0f64..1_000.0
    }

    /// A burst of ticks that all land inside the same 1m window: each
    /// element is `(seconds_since_previous_tick, price, volume)`, offsets
    /// capped so the cumulative sum stays under the 60s window width.
    fn arb_ticks_in_one_window() -> impl Strategy<Value = Vec<(u32, f64, f64)>> {
        prop::collection::vec((0u32..2, arb_price(), arb_volume()), 1..20)
    }

    proptest! {
        #[test]
        fn candle_start_is_width_aligned_and_never_exceeds_timestamp(
            epoch_secs in 0i64..2_000_000_000,
            timeframe in arb_timeframe(),
        ) {
            let timestamp = DateTime::from_timestamp(epoch_secs, 0).unwrap();
            let start = candle_start(timestamp, timeframe);
            let width = timeframe.width_secs();
            prop_assert_eq!(start.timestamp() % width, 0);
            prop_assert!(start <= timestamp);
            prop_assert!(timestamp.timestamp() - start.timestamp() < width);
        }

        #[test]
        fn candle_start_is_idempotent(
            epoch_secs in 0i64..2_000_000_000,
            timeframe in arb_timeframe(),
        ) {
            let timestamp = DateTime::from_timestamp(epoch_secs, 0).unwrap();
            let start = candle_start(timestamp, timeframe);
            prop_assert_eq!(candle_start(start, timeframe), start);
        }

        /// spec.md §8: `low <= min(prices) <= max(prices) <= high`,
        /// `open = first tick price`, `close = last tick price before
        /// emission`, `volume = sum of tick volume`, `tick_count = number of
        /// contributing ticks`.
        #[test]
        fn folding_a_tick_burst_preserves_ohlcv_invariants(ticks in arb_ticks_in_one_window()) {
            let window_start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
            let mut builder = CandleBuilder::new("PROP".into(), Timeframe::M1, window_start);

            let mut offset = 0i64;
            let mut prices = Vec::with_capacity(ticks.len());
            let mut total_volume = 0.0;
            for (delta, price, volume) in &ticks {
                offset += i64::from(*delta);
                let tick_ts = window_start + chrono::Duration::seconds(offset);
                builder.add_tick(&Tick::new("PROP", tick_ts, *price).with_volume(*volume));
                prices.push(*price);
                total_volume += volume;
            }

            let candle = builder.finalize().unwrap();
            let min_price = prices.iter().copied().fold(f64::INFINITY, f64::min);
            let max_price = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);

            prop_assert!(candle.low <= min_price);
            prop_assert!(candle.high >= max_price);
            prop_assert_eq!(candle.open, prices[0]);
            prop_assert_eq!(candle.close, *prices.last().unwrap());
            prop_assert!((candle.volume - total_volume).abs() < 1e-9);
            prop_assert_eq!(candle.tick_count as usize, prices.len());
        }
    }
}
