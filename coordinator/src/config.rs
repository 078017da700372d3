use std::path::PathBuf;

use serde::Deserialize;

/// Environment-driven settings for the `coordinator` binary (spec.md §6's
/// "Environment knobs" consumed by the hosting process), layered with the
/// `config` crate over a `.env` file loaded by `dotenvy`.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub symbol: String,
    #[serde(default = "default_config_root")]
    pub config_root: PathBuf,
    #[serde(default = "default_bus_servers")]
    pub bus_servers: String,
    #[serde(default = "default_bus_client_name")]
    pub bus_client_name: String,
    /// Postgres/TimescaleDB connection string for warm-start. Absent means
    /// warm-start is skipped and every stateful node starts cold.
    pub database_url: Option<String>,
}

fn default_config_root() -> PathBuf {
    PathBuf::from("pipelines")
}

fn default_bus_servers() -> String {
    "nats://127.0.0.1:4222".to_string()
}

fn default_bus_client_name() -> String {
    "coordinator".to_string()
}

impl Settings {
    /// Load from a `.env` file (if present) plus the process environment,
    /// following the `MatLumber-Polybot` `dotenvy` + `config` layering
    /// convention: `SYMBOL`, `CONFIG_ROOT`, `BUS_SERVERS`, `BUS_CLIENT_NAME`,
    /// `DATABASE_URL`.
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        config::Config::builder()
            .add_source(config::Environment::default())
            .build()?
            .try_deserialize()
    }
}
