use std::any::Any;

use rustc_hash::FxHashMap;
use serde_json::Value;

/// Inputs assembled for one `compute` call, keyed by `"tick"`,
/// `"candle_{timeframe}"`, or an upstream node's id.
pub type NodeInputs = FxHashMap<String, Value>;

/// A node's output for one firing. Keys are a subset of its declared
/// `NodeDef::outputs`; an empty map means the node chose not to emit.
pub type NodeOutputs = FxHashMap<String, Value>;

/// The runtime behavioral contract every DAG node implements.
///
/// `state` is owned exclusively by the executor on the node's behalf and is
/// observed/mutated by at most one `compute` call at a time. A node must
/// never perform blocking I/O inside `compute`.
pub trait Node: Send {
    /// Called once, at node instantiation, to produce this node's initial state.
    fn init_state(&self) -> Box<dyn Any + Send>;

    /// Called per firing with the current inputs and this node's state.
    fn compute(&self, inputs: &NodeInputs, state: &mut dyn Any) -> NodeOutputs;
}
