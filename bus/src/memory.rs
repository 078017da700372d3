use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::{subject_matches, BusClient, BusError, Message, Subscription};

/// In-process bus backed by a `tokio::sync::broadcast` channel, used in unit
/// tests of aggregator/coordinator wiring without a live NATS server.
///
/// Does not honor queue groups: every subscriber receives every matching
/// message, which is sufficient for single-subscriber test wiring.
pub struct InMemoryBus {
    tx: broadcast::Sender<Message>,
}

impl InMemoryBus {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(1024);
        Self { tx }
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BusClient for InMemoryBus {
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), BusError> {
        // No subscribers is not an error: at-most-once delivery tolerates it.
        let _ = self.tx.send(Message {
            subject: subject.to_string(),
            payload,
        });
        Ok(())
    }

    async fn subscribe(
        &self,
        subject: &str,
        _queue: Option<&str>,
    ) -> Result<Subscription, BusError> {
        let pattern = subject.to_string();
        let rx = self.tx.subscribe();
        let stream = BroadcastStream::new(rx)
            .filter_map(|item| item.ok())
            .filter(move |msg| subject_matches(&pattern, &msg.subject));
        Ok(Box::pin(stream))
    }

    async fn request(
        &self,
        subject: &str,
        payload: Vec<u8>,
        timeout: Duration,
    ) -> Result<Vec<u8>, BusError> {
        let reply_subject = format!("{subject}._reply.{}", uuid_like());
        let mut sub = self.subscribe(&reply_subject, None).await?;
        self.publish(subject, payload).await?;
        match tokio::time::timeout(timeout, sub.next()).await {
            Ok(Some(msg)) => Ok(msg.payload),
            _ => Err(BusError::RequestTimeout {
                subject: subject.to_string(),
            }),
        }
    }
}

fn uuid_like() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_then_subscribe_delivers_matching_messages() {
        let bus = InMemoryBus::new();
        let mut sub = bus.subscribe("ticks.raw.AAPL", None).await.unwrap();
        bus.publish("ticks.raw.AAPL", b"hello".to_vec()).await.unwrap();
        let msg = sub.next().await.unwrap();
        assert_eq!(msg.payload, b"hello");
    }

    #[tokio::test]
    async fn subscription_filters_non_matching_subjects() {
        let bus = InMemoryBus::new();
        let mut sub = bus.subscribe("candles.AAPL.*", None).await.unwrap();
        bus.publish("ticks.raw.AAPL", b"ignored".to_vec()).await.unwrap();
        bus.publish("candles.AAPL.1m", b"kept".to_vec()).await.unwrap();
        let msg = sub.next().await.unwrap();
        assert_eq!(msg.payload, b"kept");
    }
}
