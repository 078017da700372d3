//! Per-symbol bus bridge around a DAG [`executor::Executor`]: builds the
//! pipeline, subscribes to the bus subjects the DAG actually needs, and
//! republishes indicator/strategy outputs.

#![deny(clippy::all)]
#![forbid(unsafe_code)]

mod config;
mod coordinator;
mod error;
mod metrics;
mod warm_start;

pub use config::Settings;
pub use coordinator::Coordinator;
pub use error::CoordinatorError;
pub use metrics::CoordinatorMetrics;
pub use warm_start::{PgWarmStartStore, WarmStartError, WarmStartStore};
