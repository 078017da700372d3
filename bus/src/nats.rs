use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt as _;

use crate::{BusClient, BusError, Message, Subscription};

/// Bus client backed by a real NATS connection.
///
/// Reconnection is handled by `async_nats`'s own unbounded-retry,
/// fixed-backoff policy; this adapter adds no outbound buffering across
/// disconnects, matching the bus's failure semantics.
pub struct NatsBus {
    client: async_nats::Client,
}

impl NatsBus {
    /// Connect to `servers` (comma-separated NATS URLs).
    pub async fn connect(servers: &str, client_name: &str) -> Result<Self, BusError> {
        let client = async_nats::ConnectOptions::new()
            .name(client_name)
            .retry_on_initial_connect()
            .connect(servers)
            .await
            .map_err(|e| BusError::SubscribeFailed {
                subject: servers.to_string(),
                source: anyhow::Error::new(e),
            })?;
        Ok(Self { client })
    }

    #[must_use]
    pub fn from_client(client: async_nats::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BusClient for NatsBus {
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), BusError> {
        self.client
            .publish(subject.to_string(), payload.into())
            .await
            .map_err(|e| BusError::PublishFailed {
                subject: subject.to_string(),
                source: anyhow::Error::new(e),
            })
    }

    async fn subscribe(
        &self,
        subject: &str,
        queue: Option<&str>,
    ) -> Result<Subscription, BusError> {
        let inner = match queue {
            Some(q) => self
                .client
                .queue_subscribe(subject.to_string(), q.to_string())
                .await,
            None => self.client.subscribe(subject.to_string()).await,
        }
        .map_err(|e| BusError::SubscribeFailed {
            subject: subject.to_string(),
            source: anyhow::Error::new(e),
        })?;

        let stream = inner.map(|m| Message {
            subject: m.subject.to_string(),
            payload: m.payload.to_vec(),
        });
        Ok(Box::pin(stream))
    }

    async fn request(
        &self,
        subject: &str,
        payload: Vec<u8>,
        timeout: Duration,
    ) -> Result<Vec<u8>, BusError> {
        tokio::time::timeout(timeout, self.client.request(subject.to_string(), payload.into()))
            .await
            .map_err(|_| BusError::RequestTimeout {
                subject: subject.to_string(),
            })?
            .map(|m| m.payload.to_vec())
            .map_err(|e| BusError::RequestFailed {
                subject: subject.to_string(),
                source: anyhow::Error::new(e),
            })
    }
}
