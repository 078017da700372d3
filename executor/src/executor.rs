use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use common::InputType;
use dag::Dag;
use nodes::{Node, NodeInputs, NodeOutputs};
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;

use crate::event::Event;

/// Per-event execution result: every node that ran, keyed by id. A node that
/// ran but chose not to emit (or whose `compute` panicked) has an empty map.
/// Cleared and rebuilt at the start of every `execute_event` call.
#[derive(Debug, Default, Clone)]
pub struct ExecutionReport {
    pub node_outputs: FxHashMap<String, NodeOutputs>,
}

impl ExecutionReport {
    /// Non-empty outputs only, the subset the coordinator republishes.
    pub fn non_empty(&self) -> impl Iterator<Item = (&str, &NodeOutputs)> {
        self.node_outputs
            .iter()
            .filter(|(_, out)| !out.is_empty())
            .map(|(id, out)| (id.as_str(), out))
    }
}

/// Owns one symbol's DAG, its node instances, and their persistent state.
///
/// `node_states` is touched exclusively through `execute_event`, which this
/// type requires `&mut self` for: at most one dispatch runs at a time per
/// executor, matching spec.md §5's "state is observed and mutated by at most
/// one `compute` call at a time per coordinator".
pub struct Executor {
    dag: Dag,
    nodes: FxHashMap<String, Box<dyn Node>>,
    node_states: FxHashMap<String, Box<dyn Any + Send>>,
}

impl Executor {
    /// Build an executor from a validated DAG and its node instances.
    /// Calls `init_state()` once per node.
    #[must_use]
    pub fn new(dag: Dag, nodes: FxHashMap<String, Box<dyn Node>>) -> Self {
        let node_states = nodes
            .iter()
            .map(|(id, node)| (id.clone(), node.init_state()))
            .collect();
        Self {
            dag,
            nodes,
            node_states,
        }
    }

    #[must_use]
    pub fn dag(&self) -> &Dag {
        &self.dag
    }

    /// Dispatch one event: compute the impacted set, run it in topological
    /// order, thread inputs between nodes, and return this event's outputs.
    pub fn execute_event(&mut self, event: &Event) -> ExecutionReport {
        let impacted = self.impacted_nodes(event);
        if impacted.is_empty() {
            tracing::debug!("no nodes impacted by event");
            return ExecutionReport::default();
        }

        let order: Vec<String> = self
            .dag
            .topo_order
            .iter()
            .filter(|id| impacted.contains(id.as_str()))
            .cloned()
            .collect();

        let mut report = ExecutionReport::default();
        for node_id in order {
            let output = self.execute_node(&node_id, event, &report);
            report.node_outputs.insert(node_id, output);
        }
        report
    }

    /// Direct consumers of this event plus their transitive forward closure
    /// via `reverse_deps`. Iterative (explicit stack), not recursive, per
    /// spec.md §9's caution against relying on host recursion limits.
    fn impacted_nodes(&self, event: &Event) -> FxHashSet<String> {
        let mut impacted: FxHashSet<String> = FxHashSet::default();
        let mut stack: Vec<String> = Vec::new();

        for (id, def) in &self.dag.nodes {
            let directly_hit = def.inputs.iter().any(|inp| match inp.kind {
                InputType::Tick => matches!(event, Event::Tick(_)),
                InputType::Candle => event.timeframe_tag() == Some(inp.source.as_str()),
                InputType::Indicator => false,
            });
            if directly_hit && impacted.insert(id.clone()) {
                stack.push(id.clone());
            }
        }

        while let Some(node) = stack.pop() {
            if let Some(dependents) = self.dag.reverse_deps.get(&node) {
                for dependent in dependents {
                    if impacted.insert(dependent.clone()) {
                        stack.push(dependent.clone());
                    }
                }
            }
        }
        impacted
    }

    /// Replay stored candle history into a single node's state to warm-start
    /// its buffer (spec.md §6's one-shot-at-startup warm-start). Bypasses
    /// impacted-set computation entirely: only this node's own `CANDLE`
    /// inputs are fed, since warm-start seeds one stateful node's buffer from
    /// its own history, not a full DAG replay with indicator cross-talk.
    pub fn warm_start_node(&mut self, node_id: &str, candles: Vec<common::Candle>) {
        let Some(def) = self.dag.nodes.get(node_id) else {
            return;
        };
        let input_refs = def.inputs.clone();
        for candle in candles {
            let mut inputs = NodeInputs::default();
            for inp in &input_refs {
                if inp.kind == InputType::Candle && inp.source == candle.timeframe.as_str() {
                    let key = format!("candle_{}", candle.timeframe.as_str());
                    inputs.insert(key, serde_json::to_value(&candle).expect("Candle serializes"));
                }
            }
            let (Some(node), Some(state)) =
                (self.nodes.get(node_id), self.node_states.get_mut(node_id))
            else {
                continue;
            };
            let _ = catch_unwind(AssertUnwindSafe(|| node.compute(&inputs, state.as_mut())));
        }
    }

    fn execute_node(&mut self, node_id: &str, event: &Event, report: &ExecutionReport) -> NodeOutputs {
        let def = &self.dag.nodes[node_id];
        let inputs = gather_inputs(def.inputs.iter(), event, report);

        let node = &self.nodes[node_id];
        let state = self
            .node_states
            .get_mut(node_id)
            .expect("node state initialized for every node at construction");

        match catch_unwind(AssertUnwindSafe(|| node.compute(&inputs, state.as_mut()))) {
            Ok(output) => output,
            Err(_) => {
                tracing::error!(node = node_id, "node compute panicked, recording empty output");
                NodeOutputs::default()
            }
        }
    }
}

fn gather_inputs<'a>(
    input_refs: impl Iterator<Item = &'a common::InputRef>,
    event: &Event,
    report: &ExecutionReport,
) -> NodeInputs {
    let mut inputs = NodeInputs::default();
    for inp in input_refs {
        match inp.kind {
            InputType::Tick => {
                if let Event::Tick(tick) = event {
                    inputs.insert("tick".to_string(), serde_json::to_value(tick).expect("Tick serializes"));
                }
            }
            InputType::Candle => {
                if let Event::Candle(candle) = event {
                    if event.timeframe_tag() == Some(inp.source.as_str()) {
                        let key = format!("candle_{}", candle.timeframe.as_str());
                        inputs.insert(key, serde_json::to_value(candle).expect("Candle serializes"));
                    }
                }
            }
            InputType::Indicator => {
                let Some(output) = report.node_outputs.get(&inp.source) else {
                    continue;
                };
                if output.is_empty() {
                    continue;
                }
                let value: Value = match &inp.field {
                    Some(field) => match output.get(field) {
                        Some(v) => v.clone(),
                        None => continue,
                    },
                    None => serde_json::to_value(output).expect("NodeOutputs serializes"),
                };
                inputs.insert(inp.source.clone(), value);
            }
        }
    }
    inputs
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use common::{Candle, InputRef, NodeDef, Tick, Timeframe};
    use dag::DagBuilder;
    use serde_json::json;

    fn ts() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-01-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    struct Echo;
    impl Node for Echo {
        fn init_state(&self) -> Box<dyn Any + Send> {
            Box::new(0u32)
        }
        fn compute(&self, inputs: &NodeInputs, state: &mut dyn Any) -> NodeOutputs {
            let count = state.downcast_mut::<u32>().unwrap();
            *count += 1;
            let mut out = NodeOutputs::default();
            out.insert("seen".to_string(), json!(inputs.len()));
            out.insert("fire_count".to_string(), json!(*count));
            out
        }
    }

    struct Panics;
    impl Node for Panics {
        fn init_state(&self) -> Box<dyn Any + Send> {
            Box::new(())
        }
        fn compute(&self, _inputs: &NodeInputs, _state: &mut dyn Any) -> NodeOutputs {
            panic!("boom");
        }
    }

    fn node_def(id: &str, kind: InputType, source: &str) -> NodeDef {
        NodeDef {
            id: id.to_string(),
            type_name: "echo".to_string(),
            inputs: vec![InputRef {
                kind,
                source: source.to_string(),
                field: None,
            }],
            params: Default::default(),
            outputs: vec!["value".to_string()],
            is_strategy: false,
        }
    }

    fn build_executor(defs: Vec<NodeDef>, factory: impl Fn(&str) -> Box<dyn Node>) -> Executor {
        let dag = DagBuilder::build(defs.clone()).unwrap();
        let nodes = defs
            .into_iter()
            .map(|d| (d.id.clone(), factory(&d.id)))
            .collect();
        Executor::new(dag, nodes)
    }

    #[test]
    fn non_matching_event_runs_no_nodes() {
        let mut exec = build_executor(
            vec![node_def("t", InputType::Tick, "")],
            |_| Box::new(Echo),
        );
        let candle = Candle::new("AAPL", ts(), Timeframe::M1, 1.0, 1.0, 1.0, 1.0, 1.0, 1).unwrap();
        let report = exec.execute_event(&Event::Candle(candle));
        assert!(report.node_outputs.is_empty());
    }

    #[test]
    fn candle_event_runs_exactly_matching_nodes_and_dependents() {
        let t = node_def("T", InputType::Tick, "");
        let c1m = node_def("C1m", InputType::Candle, "1m");
        let c1m_der = node_def("C1m_der", InputType::Indicator, "C1m");

        let mut exec = build_executor(vec![t, c1m, c1m_der], |_| Box::new(Echo));
        let candle = Candle::new("AAPL", ts(), Timeframe::M1, 1.0, 1.0, 1.0, 1.0, 1.0, 1).unwrap();
        let report = exec.execute_event(&Event::Candle(candle));

        assert_eq!(report.node_outputs.len(), 2);
        assert!(report.node_outputs.contains_key("C1m"));
        assert!(report.node_outputs.contains_key("C1m_der"));
        assert!(!report.node_outputs.contains_key("T"));
    }

    #[test]
    fn indicator_input_sees_upstream_output() {
        let c1m = node_def("C1m", InputType::Candle, "1m");
        let der = node_def("der", InputType::Indicator, "C1m");

        let mut exec = build_executor(vec![c1m, der], |_| Box::new(Echo));
        let candle = Candle::new("AAPL", ts(), Timeframe::M1, 1.0, 1.0, 1.0, 1.0, 1.0, 1).unwrap();
        let report = exec.execute_event(&Event::Candle(candle));

        let der_out = &report.node_outputs["der"];
        // "der" saw one input keyed by C1m's id.
        assert_eq!(der_out["seen"], json!(1));
    }

    #[test]
    fn node_outputs_do_not_leak_across_events() {
        let c1m = node_def("C1m", InputType::Candle, "1m");
        let mut exec = build_executor(vec![c1m], |_| Box::new(Echo));
        let tick = Tick::new("AAPL", ts(), 100.0);

        let first = exec.execute_event(&Event::Candle(
            Candle::new("AAPL", ts(), Timeframe::M1, 1.0, 1.0, 1.0, 1.0, 1.0, 1).unwrap(),
        ));
        assert_eq!(first.node_outputs.len(), 1);

        let second = exec.execute_event(&Event::Tick(tick));
        assert!(second.node_outputs.is_empty());
    }

    #[test]
    fn compute_panic_is_isolated_as_empty_output() {
        let c1m = node_def("C1m", InputType::Candle, "1m");
        let der = node_def("der", InputType::Indicator, "C1m");
        let mut exec = build_executor(vec![c1m, der], |id| {
            if id == "C1m" {
                Box::new(Panics)
            } else {
                Box::new(Echo)
            }
        });
        let candle = Candle::new("AAPL", ts(), Timeframe::M1, 1.0, 1.0, 1.0, 1.0, 1.0, 1).unwrap();
        let report = exec.execute_event(&Event::Candle(candle));

        assert!(report.node_outputs["C1m"].is_empty());
        // downstream still ran, just with no indicator input available.
        assert_eq!(report.node_outputs["der"]["seen"], json!(0));
    }

    #[test]
    fn repeated_identical_events_yield_identical_outputs_for_pure_nodes() {
        let c1m = node_def("C1m", InputType::Candle, "1m");
        let mut exec = build_executor(vec![c1m], |_| Box::new(Echo));
        let candle = Candle::new("AAPL", ts(), Timeframe::M1, 1.0, 1.0, 1.0, 1.0, 1.0, 1).unwrap();

        // Two freshly-constructed executors processing the same single event
        // (rather than one executor firing twice, which would legitimately
        // advance Echo's internal fire_count) must match exactly.
        let mut exec2 = build_executor(vec![node_def("C1m", InputType::Candle, "1m")], |_| {
            Box::new(Echo)
        });
        let r1 = exec.execute_event(&Event::Candle(candle.clone()));
        let r2 = exec2.execute_event(&Event::Candle(candle));
        assert_eq!(r1.node_outputs["C1m"], r2.node_outputs["C1m"]);
    }
}
