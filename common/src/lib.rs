//! Shared value types for the streaming compute core: ticks, candles,
//! timeframes and the declarative pipeline/DAG configuration schema.

#![deny(clippy::all)]
#![forbid(unsafe_code)]

pub mod candle;
pub mod config;
pub mod error;
pub mod node_def;
pub mod tick;
pub mod timeframe;

pub use candle::Candle;
pub use config::{IndicatorConfig, PipelineConfig, StrategyConfig};
pub use error::SchemaError;
pub use node_def::{InputRef, InputType, NodeDef};
pub use tick::Tick;
pub use timeframe::Timeframe;

/// Trading symbol, e.g. `"AAPL"`.
pub type Symbol = String;
