//! Coordinator binary: thin `clap`/tracing wrapper around the `coordinator`
//! library, in the style of `services/data-aggregator/src/main.rs`.

use std::sync::Arc;

use anyhow::Result;
use bus::{BusClient, NatsBus};
use clap::Parser;
use coordinator::{Coordinator, PgWarmStartStore, Settings, WarmStartStore};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SERVICE_NAME: &str = "coordinator";

/// Command-line overrides for `Settings`; any flag left unset falls back to
/// the corresponding environment variable, then its default.
#[derive(Parser, Debug)]
#[command(name = SERVICE_NAME, about = "Per-symbol DAG execution coordinator")]
struct Args {
    /// Trading symbol this coordinator instance serves.
    #[arg(long, env = "SYMBOL")]
    symbol: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let mut settings = Settings::load()?;
    if let Some(symbol) = args.symbol {
        settings.symbol = symbol;
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), symbol = %settings.symbol, "starting coordinator");

    let bus: Arc<dyn BusClient> = Arc::new(NatsBus::connect(&settings.bus_servers, &settings.bus_client_name).await?);
    let metrics_registry = prometheus::Registry::new();

    let warm_start: Option<Box<dyn WarmStartStore>> = match &settings.database_url {
        Some(url) => match PgWarmStartStore::connect(url).await {
            Ok(store) => Some(Box::new(store)),
            Err(err) => {
                tracing::warn!(error = %err, "failed to connect warm-start store, nodes will start cold");
                None
            }
        },
        None => None,
    };

    let coordinator = Arc::new(
        Coordinator::build(
            settings.symbol.clone(),
            &settings.config_root,
            &nodes::default_registry(),
            bus,
            warm_start.as_deref(),
            &metrics_registry,
        )
        .await?,
    );

    let shutdown = CancellationToken::new();
    let run_handle = {
        let coordinator = coordinator.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { coordinator.run(shutdown).await })
    };

    tokio::signal::ctrl_c().await?;
    tracing::info!(symbol = %coordinator.symbol(), "shutdown signal received");
    shutdown.cancel();
    run_handle.await??;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{SERVICE_NAME}=info").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
