//! The node runtime contract, a startup-time registry, and the reference
//! rolling-window candle-pattern classifier node.

#![deny(clippy::all)]
#![forbid(unsafe_code)]

mod node;
mod pattern_classifier;
mod registry;

pub use node::{Node, NodeInputs, NodeOutputs};
pub use pattern_classifier::PatternClassifierNode;
pub use registry::{NodeError, NodeRegistry};

/// Registers every node type this repository ships, including the reference
/// pattern classifier under type tag `"pattern_classifier"`.
pub fn default_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    registry.register("pattern_classifier", |def| {
        let buffer_size = def
            .params
            .get("buffer_size")
            .and_then(|v| v.as_u64())
            .unwrap_or(3) as usize;
        Box::new(PatternClassifierNode::new(buffer_size))
    });
    registry
}
