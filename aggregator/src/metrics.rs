use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

/// Aggregator-owned counters, registered into an independent [`Registry`]
/// rather than the process-global default so tests can construct
/// throwaway instances without colliding.
pub struct AggregatorMetrics {
    pub candles_emitted_total: IntCounterVec,
    pub ticks_dropped_total: IntCounter,
    pub publish_failures_total: IntCounter,
}

impl AggregatorMetrics {
    #[must_use]
    pub fn new(registry: &Registry) -> Self {
        let candles_emitted_total = IntCounterVec::new(
            Opts::new("candles_emitted_total", "Candles finalized and published"),
            &["timeframe"],
        )
        .expect("valid metric");
        let ticks_dropped_total = IntCounter::new(
            "ticks_dropped_total",
            "Tick payloads that failed to decode and were dropped",
        )
        .expect("valid metric");
        let publish_failures_total = IntCounter::new(
            "publish_failures_total",
            "Candle publishes that failed",
        )
        .expect("valid metric");

        registry
            .register(Box::new(candles_emitted_total.clone()))
            .expect("single registration");
        registry
            .register(Box::new(ticks_dropped_total.clone()))
            .expect("single registration");
        registry
            .register(Box::new(publish_failures_total.clone()))
            .expect("single registration");

        Self {
            candles_emitted_total,
            ticks_dropped_total,
            publish_failures_total,
        }
    }
}
