use std::collections::VecDeque;

use common::{InputType, NodeDef, Timeframe};
use rustc_hash::FxHashMap;

use crate::error::ConfigError;

/// A validated, topologically-ordered graph of [`NodeDef`]s.
#[derive(Debug)]
pub struct Dag {
    pub nodes: FxHashMap<String, NodeDef>,
    /// `adjacency[id]` = the ids this node depends on (its `INDICATOR` inputs).
    pub adjacency: FxHashMap<String, Vec<String>>,
    /// `reverse_deps[id]` = the ids that depend on this node.
    pub reverse_deps: FxHashMap<String, Vec<String>>,
    /// Deterministic topological order (Kahn's algorithm, FIFO tie-break on
    /// insertion order into the ready frontier).
    pub topo_order: Vec<String>,
}

pub struct DagBuilder;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

impl DagBuilder {
    /// Build and validate a [`Dag`] from a flat list of node definitions
    /// (order matters: it seeds insertion-order tie-breaks in the topo sort).
    pub fn build(defs: Vec<NodeDef>) -> Result<Dag, ConfigError> {
        let order: Vec<String> = defs.iter().map(|d| d.id.clone()).collect();

        let mut nodes: FxHashMap<String, NodeDef> = FxHashMap::default();
        for def in defs {
            if nodes.contains_key(&def.id) {
                return Err(ConfigError::DuplicateNodeId(def.id));
            }
            validate_input_specs(&def)?;
            nodes.insert(def.id.clone(), def);
        }

        let mut adjacency: FxHashMap<String, Vec<String>> = FxHashMap::default();
        let mut reverse_deps: FxHashMap<String, Vec<String>> = FxHashMap::default();
        for id in &order {
            reverse_deps.entry(id.clone()).or_default();
        }
        for id in &order {
            let def = &nodes[id];
            let mut deps = Vec::new();
            for source in def.indicator_dependencies() {
                if !nodes.contains_key(source) {
                    return Err(ConfigError::UnknownIndicatorSource {
                        node: id.clone(),
                        indicator_id: source.to_string(),
                    });
                }
                deps.push(source.to_string());
                reverse_deps.entry(source.to_string()).or_default().push(id.clone());
            }
            adjacency.insert(id.clone(), deps);
        }

        detect_cycles(&order, &adjacency)?;
        let topo_order = topological_sort(&order, &adjacency, &reverse_deps)?;

        Ok(Dag {
            nodes,
            adjacency,
            reverse_deps,
            topo_order,
        })
    }
}

/// Validate that a node's `CANDLE` inputs name a real timeframe tag. `TICK`
/// and `INDICATOR` inputs carry no source to parse here: `TICK.source` is
/// unused and `INDICATOR.source` is validated against the node set in
/// `DagBuilder::build`'s adjacency pass instead.
fn validate_input_specs(def: &NodeDef) -> Result<(), ConfigError> {
    for input in &def.inputs {
        if input.kind == InputType::Candle && input.source.parse::<Timeframe>().is_err() {
            return Err(ConfigError::InvalidInputSpec {
                node: def.id.clone(),
                reason: format!("'{}' is not a known timeframe tag", input.source),
            });
        }
    }
    Ok(())
}

/// Iterative DFS cycle detection with an explicit stack (white/gray/black
/// coloring), reporting the full cycle path when one is found.
fn detect_cycles(
    order: &[String],
    adjacency: &FxHashMap<String, Vec<String>>,
) -> Result<(), ConfigError> {
    let mut color: FxHashMap<&str, Color> =
        order.iter().map(|id| (id.as_str(), Color::White)).collect();

    for start in order {
        if color[start.as_str()] != Color::White {
            continue;
        }
        // Each stack frame: (node id, next dependency index to visit).
        let mut stack: Vec<(&str, usize)> = vec![(start.as_str(), 0)];
        color.insert(start.as_str(), Color::Gray);

        while let Some(&mut (node, ref mut idx)) = stack.last_mut() {
            let deps = &adjacency[node];
            if *idx < deps.len() {
                let next = deps[*idx].as_str();
                *idx += 1;
                match color[next] {
                    Color::White => {
                        color.insert(next, Color::Gray);
                        stack.push((next, 0));
                    }
                    Color::Gray => {
                        let mut path: Vec<String> =
                            stack.iter().map(|(id, _)| id.to_string()).collect();
                        path.push(next.to_string());
                        let cycle_start = path.iter().position(|id| id == next).unwrap();
                        return Err(ConfigError::CycleDetected {
                            path: path[cycle_start..].to_vec(),
                        });
                    }
                    Color::Black => {}
                }
            } else {
                color.insert(node, Color::Black);
                stack.pop();
            }
        }
    }
    Ok(())
}

/// Kahn's algorithm. The initial frontier, and every later insertion, follows
/// `order` (original NodeDef declaration order) to keep ties deterministic.
fn topological_sort(
    order: &[String],
    adjacency: &FxHashMap<String, Vec<String>>,
    reverse_deps: &FxHashMap<String, Vec<String>>,
) -> Result<Vec<String>, ConfigError> {
    let mut in_degree: FxHashMap<&str, usize> = order
        .iter()
        .map(|id| (id.as_str(), adjacency[id].len()))
        .collect();

    let mut frontier: VecDeque<&str> = order
        .iter()
        .filter(|id| in_degree[id.as_str()] == 0)
        .map(|id| id.as_str())
        .collect();

    let mut result = Vec::with_capacity(order.len());
    while let Some(node) = frontier.pop_front() {
        result.push(node.to_string());
        for dependent in &reverse_deps[node] {
            let degree = in_degree.get_mut(dependent.as_str()).unwrap();
            *degree -= 1;
            if *degree == 0 {
                frontier.push_back(dependent.as_str());
            }
        }
    }

    if result.len() != order.len() {
        // Defense in depth: the DFS check above should already have caught
        // any cycle, so reaching here signals an inconsistency in the graph
        // construction itself.
        let remaining: Vec<String> = order
            .iter()
            .filter(|id| !result.contains(id))
            .cloned()
            .collect();
        return Err(ConfigError::CycleDetected { path: remaining });
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{InputRef, InputType};

    fn node(id: &str, deps: &[&str]) -> NodeDef {
        NodeDef {
            id: id.to_string(),
            type_name: "noop".to_string(),
            inputs: deps
                .iter()
                .map(|d| InputRef {
                    kind: InputType::Indicator,
                    source: d.to_string(),
                    field: None,
                })
                .collect(),
            params: Default::default(),
            outputs: vec!["value".to_string()],
            is_strategy: false,
        }
    }

    #[test]
    fn topo_order_respects_every_edge() {
        let dag = DagBuilder::build(vec![node("a", &[]), node("b", &["a"]), node("c", &["b"])])
            .unwrap();
        let pos = |id: &str| dag.topo_order.iter().position(|x| x == id).unwrap();
        assert!(pos("a") < pos("b"));
        assert!(pos("b") < pos("c"));
    }

    #[test]
    fn cycle_is_rejected_with_full_path() {
        let err = DagBuilder::build(vec![node("a", &["b"]), node("b", &["a"])]).unwrap_err();
        match err {
            ConfigError::CycleDetected { path } => {
                assert_eq!(path, vec!["a".to_string(), "b".to_string(), "a".to_string()]);
            }
            other => panic!("expected CycleDetected, got {other:?}"),
        }
    }

    #[test]
    fn unknown_indicator_source_is_rejected() {
        let err = DagBuilder::build(vec![node("a", &["ghost"])]).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownIndicatorSource { .. }));
    }

    #[test]
    fn duplicate_node_id_is_rejected() {
        let err = DagBuilder::build(vec![node("a", &[]), node("a", &[])]).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateNodeId(_)));
    }

    #[test]
    fn candle_input_with_unknown_timeframe_tag_is_rejected() {
        let mut def = node("a", &[]);
        def.inputs.push(InputRef {
            kind: InputType::Candle,
            source: "bogus".to_string(),
            field: None,
        });
        let err = DagBuilder::build(vec![def]).unwrap_err();
        match err {
            ConfigError::InvalidInputSpec { node, reason } => {
                assert_eq!(node, "a");
                assert!(reason.contains("bogus"));
            }
            other => panic!("expected InvalidInputSpec, got {other:?}"),
        }
    }
}
