//! Tick-to-candle aggregation: a stateful fan-out maintaining an
//! in-progress candle per (symbol, timeframe), emitted on time-boundary
//! crossings and via a periodic wall-clock sweep.

#![deny(clippy::all)]
#![forbid(unsafe_code)]

mod aggregator;
mod builder;
mod error;
mod metrics;

pub use aggregator::Aggregator;
pub use builder::{candle_start, CandleBuilder};
pub use error::AggregatorError;
pub use metrics::AggregatorMetrics;
