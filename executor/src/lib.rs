//! Per-symbol DAG execution: impacted-set computation, topo-ordered
//! restricted execution, input marshalling, and per-node state ownership.

#![deny(clippy::all)]
#![forbid(unsafe_code)]

mod event;
mod executor;

pub use event::Event;
pub use executor::{ExecutionReport, Executor};
