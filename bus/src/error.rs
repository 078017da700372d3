use thiserror::Error;

/// Failures reported by the bus adapter.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("not connected to bus")]
    NotConnected,

    #[error("publish to '{subject}' failed: {source}")]
    PublishFailed {
        subject: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("subscribe to '{subject}' failed: {source}")]
    SubscribeFailed {
        subject: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("request to '{subject}' timed out")]
    RequestTimeout { subject: String },

    #[error("request to '{subject}' failed: {source}")]
    RequestFailed {
        subject: String,
        #[source]
        source: anyhow::Error,
    },
}
