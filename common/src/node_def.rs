use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What kind of event an [`InputRef`] is wired to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InputType {
    Tick,
    Candle,
    Indicator,
}

/// One declared input of a [`NodeDef`].
///
/// For `Candle`, `source` is a timeframe tag (e.g. `"5m"`). For `Indicator`,
/// `source` is another node's id in the same pipeline and `field`, if set,
/// projects a single named output instead of the whole output map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputRef {
    #[serde(rename = "type")]
    pub kind: InputType,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

/// A declarative node in a pipeline's DAG.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDef {
    pub id: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub inputs: Vec<InputRef>,
    #[serde(default)]
    pub params: HashMap<String, Value>,
    #[serde(default)]
    pub outputs: Vec<String>,
    /// True if this node was declared under a pipeline's `strategies` section.
    ///
    /// Populated by the config loader from the YAML section the definition
    /// came from rather than inferred from `type_name` at publish time.
    #[serde(default)]
    pub is_strategy: bool,
}

impl NodeDef {
    /// The set of node ids this definition depends on (its `INDICATOR` inputs).
    pub fn indicator_dependencies(&self) -> impl Iterator<Item = &str> {
        self.inputs
            .iter()
            .filter(|i| i.kind == InputType::Indicator)
            .map(|i| i.source.as_str())
    }

    /// Structural identity used to dedupe indicator definitions declared
    /// redundantly across files: same type, params and inputs.
    pub fn is_structurally_identical(&self, other: &NodeDef) -> bool {
        self.type_name == other.type_name
            && self.params == other.params
            && self.inputs == other.inputs
    }
}
