use std::fs;
use std::path::Path;

use common::{IndicatorConfig, InputRef, InputType, NodeDef, PipelineConfig, StrategyConfig};
use rustc_hash::FxHashMap;

use crate::error::ConfigError;

/// Loads and merges per-symbol pipeline YAML files into a flat list of
/// [`NodeDef`]s, applying the spec's dedup/conflict rules.
pub struct ConfigLoader;

struct Seen<T> {
    value: T,
    source: String,
}

impl ConfigLoader {
    /// Load every `*.yaml` file under `config_root/<symbol>/`, merge them,
    /// and return the resulting node definitions.
    pub fn load_pipeline(symbol: &str, config_root: &Path) -> Result<Vec<NodeDef>, ConfigError> {
        let dir = config_root.join(symbol);
        let mut paths: Vec<_> = fs::read_dir(&dir)
            .map_err(|e| ConfigError::Io {
                path: dir.display().to_string(),
                source: e,
            })?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("yaml"))
            .collect();
        paths.sort();

        let mut indicators: FxHashMap<String, Seen<IndicatorConfig>> = FxHashMap::default();
        let mut strategies: FxHashMap<String, Seen<StrategyConfig>> = FxHashMap::default();
        // Preserve file-encounter order so the merge is deterministic.
        let mut indicator_order: Vec<String> = Vec::new();
        let mut strategy_order: Vec<String> = Vec::new();

        for path in &paths {
            let source = path.display().to_string();
            let text = fs::read_to_string(path).map_err(|e| ConfigError::Io {
                path: source.clone(),
                source: e,
            })?;
            let parsed: PipelineConfig =
                serde_yaml::from_str(&text).map_err(|e| ConfigError::Parse {
                    path: source.clone(),
                    source: e,
                })?;

            if parsed.symbol != symbol {
                tracing::warn!(
                    file = %source,
                    declared_symbol = %parsed.symbol,
                    expected_symbol = %symbol,
                    "pipeline file declares a different symbol than its directory"
                );
            }

            for indicator in parsed.indicators {
                merge_indicator(&mut indicators, &mut indicator_order, indicator, source.clone())?;
            }
            for strategy in parsed.strategies {
                merge_strategy(&mut strategies, &mut strategy_order, strategy, source.clone())?;
            }
        }

        let mut defs = Vec::with_capacity(indicator_order.len() + strategy_order.len());
        for id in indicator_order {
            let seen = indicators.remove(&id).expect("tracked in indicator_order");
            defs.push(indicator_to_node_def(seen.value));
        }
        for id in strategy_order {
            let seen = strategies.remove(&id).expect("tracked in strategy_order");
            defs.push(strategy_to_node_def(seen.value));
        }
        Ok(defs)
    }
}

fn merge_indicator(
    indicators: &mut FxHashMap<String, Seen<IndicatorConfig>>,
    order: &mut Vec<String>,
    incoming: IndicatorConfig,
    source: String,
) -> Result<(), ConfigError> {
    match indicators.get(&incoming.id) {
        None => {
            order.push(incoming.id.clone());
            indicators.insert(incoming.id.clone(), Seen { value: incoming, source });
            Ok(())
        }
        Some(existing) => {
            let existing_def = indicator_to_node_def(existing.value.clone());
            let incoming_def = indicator_to_node_def(incoming.clone());
            if existing_def.is_structurally_identical(&incoming_def) {
                // Structurally identical: silently de-duplicate.
                return Ok(());
            }
            let field = if existing_def.type_name != incoming_def.type_name {
                "type"
            } else if existing_def.params != incoming_def.params {
                "params"
            } else {
                "inputs"
            };
            Err(ConfigError::ConflictingIndicator {
                id: incoming.id,
                field: field.to_string(),
                first_source: existing.source.clone(),
                second_source: source,
            })
        }
    }
}

fn merge_strategy(
    strategies: &mut FxHashMap<String, Seen<StrategyConfig>>,
    order: &mut Vec<String>,
    incoming: StrategyConfig,
    source: String,
) -> Result<(), ConfigError> {
    match strategies.get(&incoming.id) {
        None => {
            order.push(incoming.id.clone());
            strategies.insert(incoming.id.clone(), Seen { value: incoming, source });
            Ok(())
        }
        Some(existing) => Err(ConfigError::DuplicateStrategy {
            id: incoming.id,
            first_source: existing.source.clone(),
            second_source: source,
        }),
    }
}

fn indicator_to_node_def(cfg: IndicatorConfig) -> NodeDef {
    NodeDef {
        id: cfg.id,
        type_name: cfg.type_name,
        inputs: cfg.inputs,
        params: cfg.params,
        outputs: cfg.outputs.unwrap_or_else(|| vec!["value".to_string()]),
        is_strategy: false,
    }
}

fn strategy_to_node_def(cfg: StrategyConfig) -> NodeDef {
    let inputs = cfg
        .depends_on
        .into_iter()
        .map(|dep| InputRef {
            kind: InputType::Indicator,
            source: dep,
            field: None,
        })
        .collect();
    NodeDef {
        id: cfg.id,
        type_name: cfg.type_name,
        inputs,
        params: cfg.params,
        outputs: vec!["signal".to_string()],
        is_strategy: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, contents: &str) {
        let mut f = fs::File::create(dir.join(name)).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
    }

    #[test]
    fn identical_indicator_duplicates_merge_to_one_node() {
        let tmp = tempfile::tempdir().unwrap();
        let sym_dir = tmp.path().join("AAPL");
        fs::create_dir_all(&sym_dir).unwrap();
        let yaml = r#"
symbol: AAPL
indicators:
  - id: ema_20
    type: ema
    params:
      length: 20
    inputs:
      - type: CANDLE
        source: "1m"
"#;
        write_file(&sym_dir, "a.yaml", yaml);
        write_file(&sym_dir, "b.yaml", yaml);

        let defs = ConfigLoader::load_pipeline("AAPL", tmp.path()).unwrap();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].id, "ema_20");
    }

    #[test]
    fn conflicting_indicator_params_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let sym_dir = tmp.path().join("AAPL");
        fs::create_dir_all(&sym_dir).unwrap();
        write_file(
            &sym_dir,
            "a.yaml",
            "symbol: AAPL\nindicators:\n  - id: ema_20\n    type: ema\n    params:\n      length: 20\n",
        );
        write_file(
            &sym_dir,
            "b.yaml",
            "symbol: AAPL\nindicators:\n  - id: ema_20\n    type: ema\n    params:\n      length: 50\n",
        );

        let err = ConfigLoader::load_pipeline("AAPL", tmp.path()).unwrap_err();
        match err {
            ConfigError::ConflictingIndicator { id, field, .. } => {
                assert_eq!(id, "ema_20");
                assert_eq!(field, "params");
            }
            other => panic!("expected ConflictingIndicator, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_strategy_id_always_conflicts() {
        let tmp = tempfile::tempdir().unwrap();
        let sym_dir = tmp.path().join("AAPL");
        fs::create_dir_all(&sym_dir).unwrap();
        write_file(
            &sym_dir,
            "a.yaml",
            "symbol: AAPL\nstrategies:\n  - id: mom\n    type: momentum\n    depends_on: []\n",
        );
        write_file(
            &sym_dir,
            "b.yaml",
            "symbol: AAPL\nstrategies:\n  - id: mom\n    type: momentum\n    depends_on: []\n",
        );

        let err = ConfigLoader::load_pipeline("AAPL", tmp.path()).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateStrategy { .. }));
    }

    #[test]
    fn strategy_depends_on_becomes_indicator_inputs() {
        let tmp = tempfile::tempdir().unwrap();
        let sym_dir = tmp.path().join("AAPL");
        fs::create_dir_all(&sym_dir).unwrap();
        write_file(
            &sym_dir,
            "a.yaml",
            "symbol: AAPL\nstrategies:\n  - id: mom\n    type: momentum\n    depends_on: [ema_20]\n",
        );

        let defs = ConfigLoader::load_pipeline("AAPL", tmp.path()).unwrap();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].outputs, vec!["signal".to_string()]);
        assert_eq!(defs[0].inputs[0].source, "ema_20");
        assert_eq!(defs[0].inputs[0].kind, InputType::Indicator);
        assert!(defs[0].is_strategy);
    }
}
