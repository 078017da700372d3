use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::node_def::InputRef;

/// One `indicators:` entry in a pipeline YAML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorConfig {
    pub id: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub params: HashMap<String, Value>,
    #[serde(default)]
    pub inputs: Vec<InputRef>,
    /// Overrides the default single `"value"` output to declare multiple
    /// named outputs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<String>>,
}

/// One `strategies:` entry in a pipeline YAML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub id: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub params: HashMap<String, Value>,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

/// One parsed pipeline YAML file, as loaded from `pipelines/<SYMBOL>/*.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub symbol: String,
    #[serde(default)]
    pub indicators: Vec<IndicatorConfig>,
    #[serde(default)]
    pub strategies: Vec<StrategyConfig>,
}
