use std::path::Path;
use std::sync::Arc;

use bus::{topics, BusClient};
use common::{InputType, Timeframe};
use dag::{ConfigLoader, DagBuilder};
use executor::{ExecutionReport, Event, Executor};
use nodes::NodeRegistry;
use prometheus::Registry;
use rustc_hash::FxHashMap;
use tokio::sync::Mutex;
use tokio_stream::StreamExt as _;
use tokio_util::sync::CancellationToken;

use crate::error::CoordinatorError;
use crate::metrics::CoordinatorMetrics;
use crate::warm_start::WarmStartStore;

/// Per-symbol bus bridge around an [`Executor`]: builds the pipeline, wires
/// bus subscriptions to the event types the DAG actually consumes, and
/// republishes node outputs.
pub struct Coordinator {
    symbol: String,
    bus: Arc<dyn BusClient>,
    executor: Mutex<Executor>,
    needs_ticks: bool,
    needs_candles: bool,
    is_strategy: FxHashMap<String, bool>,
    metrics: CoordinatorMetrics,
}

impl Coordinator {
    /// Load the symbol's pipeline config, build and validate its DAG,
    /// instantiate every node via `registry`, and warm-start any node that
    /// declares a `buffer_size` param over a `CANDLE` input.
    pub async fn build(
        symbol: impl Into<String>,
        config_root: &Path,
        registry: &NodeRegistry,
        bus: Arc<dyn BusClient>,
        warm_start: Option<&dyn WarmStartStore>,
        metrics_registry: &Registry,
    ) -> Result<Self, CoordinatorError> {
        let symbol = symbol.into();
        let defs = ConfigLoader::load_pipeline(&symbol, config_root)?;

        let needs_ticks = defs
            .iter()
            .any(|d| d.inputs.iter().any(|i| i.kind == InputType::Tick));
        let needs_candles = defs
            .iter()
            .any(|d| d.inputs.iter().any(|i| i.kind == InputType::Candle));
        let is_strategy: FxHashMap<String, bool> =
            defs.iter().map(|d| (d.id.clone(), d.is_strategy)).collect();

        let node_instances = registry.instantiate_all(&defs)?;
        let dag = DagBuilder::build(defs.clone())?;
        let mut executor = Executor::new(dag, node_instances);

        let metrics = CoordinatorMetrics::new(metrics_registry);

        if let Some(store) = warm_start {
            for def in &defs {
                let Some(candle_input) = def.inputs.iter().find(|i| i.kind == InputType::Candle)
                else {
                    continue;
                };
                let Some(buffer_size) = def.params.get("buffer_size").and_then(|v| v.as_u64())
                else {
                    continue;
                };
                let Ok(timeframe) = candle_input.source.parse::<Timeframe>() else {
                    continue;
                };
                match store
                    .load_recent_candles(&symbol, timeframe, buffer_size as i64)
                    .await
                {
                    Ok(candles) => executor.warm_start_node(&def.id, candles),
                    Err(err) => {
                        tracing::warn!(node = %def.id, symbol = %symbol, error = %err, "warm-start failed, node starting cold");
                        metrics.warm_start_failures_total.inc();
                    }
                }
            }
        }

        Ok(Self {
            symbol,
            bus,
            executor: Mutex::new(executor),
            needs_ticks,
            needs_candles,
            is_strategy,
            metrics,
        })
    }

    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Subscribe to `ticks.raw.{symbol}` and/or `candles.{symbol}.*`
    /// depending on which input kinds the DAG consumes, using a
    /// symbol-derived queue group so horizontally-scaled coordinators
    /// load-balance incoming events. Runs until `shutdown` is cancelled.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) -> Result<(), CoordinatorError> {
        let sanitized = topics::sanitize(&self.symbol);
        let mut handles = Vec::new();

        if self.needs_ticks {
            let topic = topics::ticks_raw(&self.symbol);
            let queue = format!("coordinator-{sanitized}-ticks");
            let mut sub = self.bus.subscribe(&topic, Some(&queue)).await?;
            tracing::info!(symbol = %self.symbol, topic = %topic, "subscribed to ticks");
            let this = self.clone();
            let shutdown = shutdown.clone();
            handles.push(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        msg = sub.next() => match msg {
                            Some(m) => this.handle_tick_payload(&m.payload).await,
                            None => break,
                        }
                    }
                }
            }));
        }

        if self.needs_candles {
            let topic = topics::candles_wildcard(&self.symbol);
            let queue = format!("coordinator-{sanitized}-candles");
            let mut sub = self.bus.subscribe(&topic, Some(&queue)).await?;
            tracing::info!(symbol = %self.symbol, topic = %topic, "subscribed to candles");
            let this = self.clone();
            let shutdown = shutdown.clone();
            handles.push(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        msg = sub.next() => match msg {
                            Some(m) => this.handle_candle_payload(&m.payload).await,
                            None => break,
                        }
                    }
                }
            }));
        }

        for handle in handles {
            let _ = handle.await;
        }
        Ok(())
    }

    async fn handle_tick_payload(&self, payload: &[u8]) {
        let tick: common::Tick = match serde_json::from_slice(payload) {
            Ok(t) => t,
            Err(err) => {
                tracing::warn!(symbol = %self.symbol, error = %err, "failed to decode tick payload, dropping");
                return;
            }
        };
        if tick.symbol != self.symbol {
            tracing::warn!(expected = %self.symbol, got = %tick.symbol, "tick for wrong symbol, dropping");
            return;
        }
        let report = {
            let mut executor = self.executor.lock().await;
            executor.execute_event(&Event::Tick(tick))
        };
        self.publish_outputs(report).await;
    }

    async fn handle_candle_payload(&self, payload: &[u8]) {
        let candle: common::Candle = match serde_json::from_slice(payload) {
            Ok(c) => c,
            Err(err) => {
                tracing::warn!(symbol = %self.symbol, error = %err, "failed to decode candle payload, dropping");
                return;
            }
        };
        if candle.symbol != self.symbol {
            tracing::warn!(expected = %self.symbol, got = %candle.symbol, "candle for wrong symbol, dropping");
            return;
        }
        let report = {
            let mut executor = self.executor.lock().await;
            executor.execute_event(&Event::Candle(candle))
        };
        self.publish_outputs(report).await;
    }

    async fn publish_outputs(&self, report: ExecutionReport) {
        for (node_id, output) in report.non_empty() {
            let subject = if self.is_strategy.get(node_id).copied().unwrap_or(false) {
                topics::strategy_signal(&self.symbol, node_id)
            } else {
                topics::indicator(&self.symbol, node_id)
            };

            let payload = match serde_json::to_vec(output) {
                Ok(bytes) => bytes,
                Err(err) => {
                    tracing::error!(node = node_id, error = %err, "failed to encode node output, dropping");
                    continue;
                }
            };

            if let Err(err) = self.bus.publish(&subject, payload).await {
                self.metrics.publish_failures_total.inc();
                tracing::error!(node = node_id, subject = %subject, error = %err, "failed to publish node output");
            } else {
                tracing::debug!(node = node_id, subject = %subject, "published node output");
            }
        }
    }
}
