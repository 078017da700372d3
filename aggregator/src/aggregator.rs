use std::sync::Arc;
use std::time::Duration;

use bus::{topics, BusClient};
use chrono::{DateTime, Utc};
use common::{Candle, Symbol, Tick, Timeframe};
use rustc_hash::FxHashMap;
use tokio::sync::Mutex;
use tokio_stream::StreamExt as _;
use tokio_util::sync::CancellationToken;

use crate::builder::{candle_start, decode_tick, CandleBuilder};
use crate::error::AggregatorError;
use crate::metrics::AggregatorMetrics;

/// Tick-to-candle state machine: one in-progress [`CandleBuilder`] per
/// (symbol, timeframe), folded on every tick and finalized either on a
/// time-boundary crossing or by the 1 Hz sweep.
///
/// The builder table is mutated only under `builders`, held for the
/// duration of the fold; finalized candles are published after the lock is
/// released (spec.md §4.2's "outside the aggregator's internal critical
/// section").
pub struct Aggregator {
    bus: Arc<dyn BusClient>,
    timeframes: Vec<Timeframe>,
    builders: Mutex<FxHashMap<(Symbol, Timeframe), CandleBuilder>>,
    metrics: AggregatorMetrics,
}

impl Aggregator {
    #[must_use]
    pub fn new(bus: Arc<dyn BusClient>, timeframes: Vec<Timeframe>, registry: &prometheus::Registry) -> Self {
        Self {
            bus,
            timeframes,
            builders: Mutex::new(FxHashMap::default()),
            metrics: AggregatorMetrics::new(registry),
        }
    }

    /// Subscribe to every symbol's raw tick stream and start the 1 Hz sweep.
    /// Runs until `shutdown` is cancelled.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) -> Result<(), AggregatorError> {
        let mut ticks = self.bus.subscribe(&topics::ticks_raw_wildcard(), None).await?;

        let sweep_handle = {
            let this = self.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { this.sweep_loop(shutdown).await })
        };

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                message = ticks.next() => {
                    match message {
                        Some(msg) => self.handle_tick_payload(&msg.payload).await,
                        None => break,
                    }
                }
            }
        }

        sweep_handle.abort();
        self.flush().await;
        Ok(())
    }

    async fn handle_tick_payload(&self, payload: &[u8]) {
        let tick = match decode_tick(payload) {
            Ok(tick) => tick,
            Err(err) => {
                tracing::warn!(error = %err, "failed to decode tick payload, dropping");
                self.metrics.ticks_dropped_total.inc();
                return;
            }
        };
        self.handle_tick(tick).await;
    }

    /// Fold one tick into every configured timeframe's builder. A tick whose
    /// aligned start differs from the current builder finalizes the old
    /// builder (if non-empty) and replaces it before folding in, per
    /// spec.md §4.2's boundary-emission algorithm.
    pub async fn handle_tick(&self, tick: Tick) {
        let mut completed = Vec::new();
        {
            let mut builders = self.builders.lock().await;
            for &timeframe in &self.timeframes {
                let key = (tick.symbol.clone(), timeframe);
                let start = candle_start(tick.timestamp, timeframe);

                let needs_new = builders.get(&key).is_none_or(|b| b.start != start);
                if needs_new {
                    if let Some(old) = builders.get(&key) {
                        if !old.is_empty() {
                            if let Some(candle) = old.finalize() {
                                completed.push(candle);
                            }
                        }
                    }
                    builders.insert(key.clone(), CandleBuilder::new(tick.symbol.clone(), timeframe, start));
                }
                builders.get_mut(&key).expect("just inserted or pre-existing").add_tick(&tick);
            }
        }
        for candle in completed {
            self.publish_candle(candle).await;
        }
    }

    async fn sweep_loop(&self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = interval.tick() => {
                    let completed = self.sweep_once(Utc::now()).await;
                    for candle in completed {
                        self.publish_candle(candle).await;
                    }
                }
            }
        }
    }

    /// One sweep pass: finalize and replace every builder whose window has
    /// closed in wall-clock time, even if no further tick ever arrives.
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> Vec<Candle> {
        let mut completed = Vec::new();
        let mut builders = self.builders.lock().await;
        for ((symbol, timeframe), builder) in builders.iter_mut() {
            if builder.is_empty() {
                continue;
            }
            let end = builder.start + chrono::Duration::seconds(timeframe.width_secs());
            if now >= end {
                if let Some(candle) = builder.finalize() {
                    completed.push(candle);
                }
                let new_start = candle_start(now, *timeframe);
                *builder = CandleBuilder::new(symbol.clone(), *timeframe, new_start);
            }
        }
        completed
    }

    /// Best-effort flush of every non-empty builder, for graceful shutdown.
    /// No guarantee the flushed candles are delivered before process exit.
    pub async fn flush(&self) {
        let builders = self.builders.lock().await;
        let mut completed = Vec::new();
        for builder in builders.values() {
            if !builder.is_empty() {
                if let Some(candle) = builder.finalize() {
                    completed.push(candle);
                }
            }
        }
        drop(builders);
        for candle in completed {
            self.publish_candle(candle).await;
        }
    }

    async fn publish_candle(&self, candle: Candle) {
        let subject = topics::candle(&candle.symbol, candle.timeframe.as_str());
        let payload = match serde_json::to_vec(&candle) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::error!(error = %err, "failed to encode candle, dropping");
                return;
            }
        };
        match self.bus.publish(&subject, payload).await {
            Ok(()) => {
                self.metrics
                    .candles_emitted_total
                    .with_label_values(&[candle.timeframe.as_str()])
                    .inc();
                tracing::info!(
                    symbol = %candle.symbol,
                    timeframe = %candle.timeframe,
                    open = candle.open,
                    high = candle.high,
                    low = candle.low,
                    close = candle.close,
                    volume = candle.volume,
                    tick_count = candle.tick_count,
                    "published candle"
                );
            }
            Err(err) => {
                self.metrics.publish_failures_total.inc();
                tracing::error!(symbol = %candle.symbol, timeframe = %candle.timeframe, error = %err, "failed to publish candle");
            }
        }
    }
}
