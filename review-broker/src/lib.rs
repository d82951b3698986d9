//! C1 (Stream Broker Gateway) and C2 (Idempotency Keeper).
//!
//! No `async_trait`, no `Box<dyn ...>`: backends are selected by an enum and
//! dispatched with a flat `match`, the same shape used throughout the
//! teacher's provider clients.

pub mod errors;
pub mod in_memory;
pub mod redis_backend;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use review_types::StreamRecord;
use tokio::sync::broadcast;

pub use errors::{BrokerError, BrokerResult, IdempotencyError, IdempotencyResult};
use in_memory::InMemoryBroker;
use redis_backend::RedisBroker;

/// Two streams named by spec §6: `review:requests` (DIFF) and
/// `review:agent-requests` (AGENTIC).
pub const DIFF_STREAM: &str = "review:requests";
pub const AGENTIC_STREAM: &str = "review:agent-requests";

pub fn result_hash_key(request_id: &str) -> String {
    format!("review:results:{request_id}")
}

pub fn status_channel(request_id: &str) -> String {
    format!("review:status:{request_id}")
}

pub fn status_pattern() -> &'static str {
    "review:status:*"
}

#[derive(Clone)]
enum Backend {
    Redis(Arc<RedisBroker>),
    InMemory(Arc<InMemoryBroker>),
}

/// Combined stream-broker + key/value + pub-sub + idempotency client.
#[derive(Clone)]
pub struct BrokerClient {
    backend: Backend,
}

impl BrokerClient {
    pub async fn connect_redis(url: &str) -> BrokerResult<Self> {
        let broker = RedisBroker::connect(url).await?;
        Ok(Self {
            backend: Backend::Redis(Arc::new(broker)),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            backend: Backend::InMemory(Arc::new(InMemoryBroker::new())),
        }
    }

    pub async fn publish(&self, stream_key: &str, request_id: &str, payload: &str) -> BrokerResult<String> {
        match &self.backend {
            Backend::Redis(r) => r.publish(stream_key, request_id, payload).await,
            Backend::InMemory(m) => m.publish(stream_key, request_id, payload),
        }
    }

    pub async fn ensure_group(&self, stream_key: &str, group: &str) -> BrokerResult<()> {
        match &self.backend {
            Backend::Redis(r) => r.ensure_group(stream_key, group).await,
            Backend::InMemory(m) => m.ensure_group(stream_key, group),
        }
    }

    pub async fn read_batch(
        &self,
        stream_key: &str,
        group: &str,
        consumer_id: &str,
        max_count: usize,
        block_for: Duration,
    ) -> BrokerResult<Vec<StreamRecord>> {
        match &self.backend {
            Backend::Redis(r) => {
                r.read_batch(stream_key, group, consumer_id, max_count, block_for).await
            }
            Backend::InMemory(m) => m.read_batch(stream_key, group, max_count),
        }
    }

    pub async fn acknowledge(&self, stream_key: &str, group: &str, record_id: &str) -> BrokerResult<()> {
        match &self.backend {
            Backend::Redis(r) => r.acknowledge(stream_key, group, record_id).await,
            Backend::InMemory(m) => m.acknowledge(stream_key, group, record_id),
        }
    }

    pub async fn put_hash(&self, key: &str, fields: HashMap<String, String>) -> BrokerResult<()> {
        match &self.backend {
            Backend::Redis(r) => r.put_hash(key, fields).await,
            Backend::InMemory(m) => m.put_hash(key, fields),
        }
    }

    pub fn get_hash_in_memory(&self, key: &str) -> Option<HashMap<String, String>> {
        match &self.backend {
            Backend::InMemory(m) => m.get_hash(key),
            Backend::Redis(_) => None,
        }
    }

    /// Reads a result hash regardless of backend (spec §4.8's result
    /// subscriber needs this after observing a status-channel event).
    pub async fn get_hash(&self, key: &str) -> BrokerResult<Option<HashMap<String, String>>> {
        match &self.backend {
            Backend::Redis(r) => {
                let fields = r.get_hash(key).await?;
                Ok(if fields.is_empty() { None } else { Some(fields) })
            }
            Backend::InMemory(m) => Ok(m.get_hash(key)),
        }
    }

    pub async fn publish_topic(&self, channel: &str, payload: &str) -> BrokerResult<()> {
        match &self.backend {
            Backend::Redis(r) => r.publish_topic(channel, payload).await,
            Backend::InMemory(m) => m.publish_topic(channel, payload),
        }
    }

    /// In-memory subscription, used by tests and by the in-process result
    /// subscriber when no Redis is configured. The Redis-backed subscriber
    /// path uses `PSUBSCRIBE` directly from `review-gateway` since a pub-sub
    /// connection must be held open outside the connection-manager pool.
    pub fn subscribe_in_memory(&self, channel: &str) -> Option<broadcast::Receiver<(String, String)>> {
        match &self.backend {
            Backend::InMemory(m) => Some(m.subscribe(channel)),
            Backend::Redis(_) => None,
        }
    }

    /// C2: compare-and-set-if-absent claim. Returns `true` for `NEW`,
    /// `false` for `REPLAY`.
    pub async fn check_and_mark(&self, key: &str, ttl: Duration) -> IdempotencyResult<bool> {
        match &self.backend {
            Backend::Redis(r) => r.check_and_mark(key, ttl).await,
            Backend::InMemory(m) => m.check_and_mark(key, ttl),
        }
    }

    pub async fn exists(&self, key: &str) -> IdempotencyResult<bool> {
        match &self.backend {
            Backend::Redis(r) => r.exists(key).await,
            Backend::InMemory(m) => m.exists(key),
        }
    }

    /// Pattern pub-sub is a Redis-native feature; the in-memory backend only
    /// supports exact-channel subscription (see [`Self::subscribe_in_memory`])
    /// and is meant for tests that know the channel name up front.
    pub async fn subscribe_status_pattern(&self, pattern: &str) -> BrokerResult<StatusSubscription> {
        match &self.backend {
            Backend::Redis(r) => Ok(StatusSubscription::Redis(r.psubscribe(pattern).await?)),
            Backend::InMemory(_) => Err(BrokerError::Unavailable(
                "pattern subscription is not supported by the in-memory backend".to_string(),
            )),
        }
    }
}

/// A single `channel, payload` pair observed on a status subscription.
pub enum StatusSubscription {
    Redis(redis::aio::PubSub),
    InMemory(broadcast::Receiver<(String, String)>),
}

impl StatusSubscription {
    pub async fn recv(&mut self) -> Option<(String, String)> {
        match self {
            StatusSubscription::Redis(pubsub) => {
                use futures::StreamExt;
                let msg = pubsub.on_message().next().await?;
                let channel = msg.get_channel_name().to_string();
                let payload: String = msg.get_payload().unwrap_or_default();
                Some((channel, payload))
            }
            StatusSubscription::InMemory(rx) => rx.recv().await.ok(),
        }
    }
}

/// `NEW` claims dedup intake; `REPLAY` maps to the `already_processed`
/// webhook response (spec §4.2, §4.3 step 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    New,
    Replay,
}

pub async fn check_and_mark(client: &BrokerClient, key: &str, ttl: Duration) -> IdempotencyResult<ClaimOutcome> {
    if client.check_and_mark(key, ttl).await? {
        Ok(ClaimOutcome::New)
    } else {
        Ok(ClaimOutcome::Replay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_read_batch_then_acknowledge_removes_pending() {
        let broker = BrokerClient::in_memory();
        broker.ensure_group(DIFF_STREAM, "workers").await.unwrap();
        broker.publish(DIFF_STREAM, "req-1", "{}").await.unwrap();

        let batch = broker
            .read_batch(DIFF_STREAM, "workers", "worker-1", 10, Duration::from_millis(1))
            .await
            .unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].request_id, "req-1");

        broker
            .acknowledge(DIFF_STREAM, "workers", &batch[0].record_id)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn read_batch_on_unknown_group_is_an_error() {
        let broker = BrokerClient::in_memory();
        let err = broker
            .read_batch(DIFF_STREAM, "nope", "c1", 10, Duration::from_millis(1))
            .await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn idempotency_claim_is_single_writer() {
        let broker = BrokerClient::in_memory();
        let ttl = Duration::from_secs(60);
        let first = check_and_mark(&broker, "owner/repo:42", ttl).await.unwrap();
        let second = check_and_mark(&broker, "owner/repo:42", ttl).await.unwrap();
        assert_eq!(first, ClaimOutcome::New);
        assert_eq!(second, ClaimOutcome::Replay);
    }

    #[tokio::test]
    async fn result_hash_then_status_channel_ordering_is_observable() {
        let broker = BrokerClient::in_memory();
        let mut fields = HashMap::new();
        fields.insert("status".to_string(), "COMPLETED".to_string());
        broker.put_hash(&result_hash_key("req-1"), fields).await.unwrap();
        assert!(broker.get_hash_in_memory(&result_hash_key("req-1")).is_some());
    }
}
