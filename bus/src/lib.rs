//! Thin pub/sub surface over the message bus: subject helpers, wildcard
//! matching, and a real transport plus an in-memory test double.

#![deny(clippy::all)]
#![forbid(unsafe_code)]

mod error;
mod memory;
mod nats;
pub mod topics;

pub use error::BusError;
pub use memory::InMemoryBus;
pub use nats::NatsBus;

use async_trait::async_trait;
use std::time::Duration;
use tokio_stream::Stream;

/// One inbound message delivered to a subscription.
#[derive(Debug, Clone)]
pub struct Message {
    pub subject: String,
    pub payload: Vec<u8>,
}

/// A live subscription: an async stream of matching messages.
pub type Subscription = std::pin::Pin<Box<dyn Stream<Item = Message> + Send>>;

/// Pub/sub surface every component in this core talks to.
///
/// Subjects support NATS-style wildcards: `*` matches exactly one
/// dot-separated segment, `>` matches one or more trailing segments.
#[async_trait]
pub trait BusClient: Send + Sync {
    /// Publish a payload to `subject`. Fails loudly if the client is
    /// disconnected; there is no client-side buffering across disconnects.
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), BusError>;

    /// Subscribe to `subject`. When `queue` is set, this subscription
    /// competes with other subscribers in the same queue group: each
    /// message is delivered to exactly one member.
    async fn subscribe(
        &self,
        subject: &str,
        queue: Option<&str>,
    ) -> Result<Subscription, BusError>;

    /// Publish `payload` on `subject` and wait up to `timeout` for a single
    /// reply. The only path in this interface that carries a timeout.
    async fn request(
        &self,
        subject: &str,
        payload: Vec<u8>,
        timeout: Duration,
    ) -> Result<Vec<u8>, BusError>;
}

/// Whether `subject` matches a NATS-style `pattern` (`*` and `>` wildcards).
#[must_use]
pub fn subject_matches(pattern: &str, subject: &str) -> bool {
    let pattern_parts: Vec<&str> = pattern.split('.').collect();
    let subject_parts: Vec<&str> = subject.split('.').collect();

    let mut p = 0;
    let mut s = 0;
    while p < pattern_parts.len() {
        match pattern_parts[p] {
            ">" => return s < subject_parts.len(),
            "*" => {
                if s >= subject_parts.len() {
                    return false;
                }
            }
            literal => {
                if s >= subject_parts.len() || subject_parts[s] != literal {
                    return false;
                }
            }
        }
        p += 1;
        s += 1;
    }
    s == subject_parts.len()
}
