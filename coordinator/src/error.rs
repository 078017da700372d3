use thiserror::Error;

/// Startup-fatal failures that block a coordinator from running.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Config(#[from] dag::ConfigError),

    #[error(transparent)]
    Node(#[from] nodes::NodeError),

    #[error(transparent)]
    Bus(#[from] bus::BusError),
}
