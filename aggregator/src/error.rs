use thiserror::Error;

/// Startup-fatal failures for the aggregator binary.
#[derive(Debug, Error)]
pub enum AggregatorError {
    #[error("failed to subscribe to tick stream: {0}")]
    Subscribe(#[from] bus::BusError),
}
