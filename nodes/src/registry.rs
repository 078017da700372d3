use common::NodeDef;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::node::Node;

/// A node construction error, surfaced as a configuration error at startup.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("node '{node}' has unknown type '{type_name}'")]
    UnknownType { node: String, type_name: String },
}

type Factory = Box<dyn Fn(&NodeDef) -> Box<dyn Node> + Send + Sync>;

/// Maps a `NodeDef::type_name` tag to a factory that constructs the matching
/// node instance. Resolved once at coordinator startup, never on the hot path.
#[derive(Default)]
pub struct NodeRegistry {
    factories: FxHashMap<String, Factory>,
}

impl NodeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for `type_name`.
    pub fn register(
        &mut self,
        type_name: impl Into<String>,
        factory: impl Fn(&NodeDef) -> Box<dyn Node> + Send + Sync + 'static,
    ) {
        self.factories.insert(type_name.into(), Box::new(factory));
    }

    /// Instantiate every node in `defs`, keyed by id.
    pub fn instantiate_all(
        &self,
        defs: &[NodeDef],
    ) -> Result<FxHashMap<String, Box<dyn Node>>, NodeError> {
        let mut out = FxHashMap::default();
        for def in defs {
            out.insert(def.id.clone(), self.create(def)?);
        }
        Ok(out)
    }

    fn create(&self, def: &NodeDef) -> Result<Box<dyn Node>, NodeError> {
        let factory = self
            .factories
            .get(&def.type_name)
            .ok_or_else(|| NodeError::UnknownType {
                node: def.id.clone(),
                type_name: def.type_name.clone(),
            })?;
        Ok(factory(def))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeInputs, NodeOutputs};
    use std::any::Any;

    struct Noop;
    impl Node for Noop {
        fn init_state(&self) -> Box<dyn Any + Send> {
            Box::new(())
        }
        fn compute(&self, _inputs: &NodeInputs, _state: &mut dyn Any) -> NodeOutputs {
            NodeOutputs::default()
        }
    }

    fn def(id: &str, type_name: &str) -> NodeDef {
        NodeDef {
            id: id.to_string(),
            type_name: type_name.to_string(),
            inputs: vec![],
            params: Default::default(),
            outputs: vec!["value".to_string()],
            is_strategy: false,
        }
    }

    #[test]
    fn unregistered_type_is_an_error() {
        let registry = NodeRegistry::new();
        let result = registry.create(&def("n1", "ghost"));
        assert!(matches!(result, Err(NodeError::UnknownType { .. })));
    }

    #[test]
    fn registered_type_constructs_successfully() {
        let mut registry = NodeRegistry::new();
        registry.register("noop", |_def| Box::new(Noop));
        let instances = registry.instantiate_all(&[def("n1", "noop")]).unwrap();
        assert!(instances.contains_key("n1"));
    }
}
