//! Aggregator binary: thin `clap`/tracing wrapper around the `aggregator`
//! library, in the style of `services/data-aggregator/src/main.rs`.

use std::sync::Arc;

use aggregator::Aggregator;
use anyhow::Result;
use bus::NatsBus;
use clap::Parser;
use common::Timeframe;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SERVICE_NAME: &str = "aggregator";

#[derive(Parser, Debug)]
#[command(name = SERVICE_NAME, about = "Tick-to-candle aggregation service")]
struct Args {
    /// Comma-separated NATS server URLs.
    #[arg(long, env = "BUS_SERVERS", default_value = "nats://127.0.0.1:4222")]
    bus_servers: String,

    /// NATS client name, used for reconnect logging.
    #[arg(long, env = "BUS_CLIENT_NAME", default_value = SERVICE_NAME)]
    bus_client_name: String,

    /// Comma-separated timeframe tags to maintain, e.g. "1m,5m,15m".
    #[arg(long, env = "TIMEFRAMES", default_value = "1m,5m,15m")]
    timeframes: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting aggregator");

    let timeframes: Vec<Timeframe> = args
        .timeframes
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect::<Result<_, _>>()
        .map_err(|e| anyhow::anyhow!("invalid TIMEFRAMES: {e}"))?;

    let bus = NatsBus::connect(&args.bus_servers, &args.bus_client_name).await?;
    let registry = prometheus::Registry::new();
    let aggregator = Arc::new(Aggregator::new(Arc::new(bus), timeframes, &registry));

    let shutdown = CancellationToken::new();
    let run_handle = {
        let aggregator = aggregator.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { aggregator.run(shutdown).await })
    };

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received, flushing and closing");
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
