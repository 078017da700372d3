use thiserror::Error;

/// Configuration and graph-construction errors. All are fatal at startup:
/// they block the owning coordinator from starting.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "conflicting indicator '{id}': {field} differs between {first_source} and {second_source}"
    )]
    ConflictingIndicator {
        id: String,
        field: String,
        first_source: String,
        second_source: String,
    },

    #[error("duplicate strategy id '{id}' (declared in {first_source} and {second_source})")]
    DuplicateStrategy {
        id: String,
        first_source: String,
        second_source: String,
    },

    #[error("node '{node}' references unknown indicator source '{indicator_id}'")]
    UnknownIndicatorSource { node: String, indicator_id: String },

    #[error("dependency cycle: {}", .path.join(" -> "))]
    CycleDetected { path: Vec<String> },

    #[error("node '{node}' has an invalid input spec: {reason}")]
    InvalidInputSpec { node: String, reason: String },

    #[error("duplicate node id '{0}'")]
    DuplicateNodeId(String),

    #[error("failed to read pipeline directory '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse pipeline file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}
