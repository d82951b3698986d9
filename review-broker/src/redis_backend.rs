//! Redis-backed stream broker.
//!
//! Streams map onto Redis Streams (`XADD`/`XGROUP CREATE`/`XREADGROUP`/`XACK`);
//! the key/value + pub-sub surface maps onto `HSET`/`PUBLISH`/`PSUBSCRIBE`.
//! Idempotency claims use `SET key value NX EX ttl`, an atomic
//! compare-and-set-if-absent at the protocol level (spec §4.2 — "not a
//! read-then-write pair").

use std::collections::HashMap;
use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use review_types::StreamRecord;
use tracing::{debug, warn};

use crate::errors::{BrokerError, BrokerResult, IdempotencyError, IdempotencyResult};

pub struct RedisBroker {
    client: redis::Client,
    conn: ConnectionManager,
}

impl RedisBroker {
    pub async fn connect(url: &str) -> BrokerResult<Self> {
        let client = redis::Client::open(url).map_err(BrokerError::Redis)?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(BrokerError::Redis)?;
        Ok(Self { client, conn })
    }

    pub async fn publish(
        &self,
        stream_key: &str,
        request_id: &str,
        payload: &str,
    ) -> BrokerResult<String> {
        let mut conn = self.conn.clone();
        let record_id: String = conn
            .xadd(
                stream_key,
                "*",
                &[("requestId", request_id), ("payload", payload)],
            )
            .await
            .map_err(|e| BrokerError::Unavailable(e.to_string()))?;
        Ok(record_id)
    }

    /// Treats "group already exists" (`BUSYGROUP`) as success, per spec §4.1.
    pub async fn ensure_group(&self, stream_key: &str, group: &str) -> BrokerResult<()> {
        let mut conn = self.conn.clone();
        let result: redis::RedisResult<()> = conn
            .xgroup_create_mkstream(stream_key, group, "0")
            .await;
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!(stream_key, group, "consumer group already exists");
                Ok(())
            }
            Err(e) => Err(BrokerError::Redis(e)),
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
        let mut conn = self.conn.clone();
        let opts = redis::streams::StreamReadOptions::default()
            .group(group, consumer_id)
            .count(max_count)
            .block(block_for.as_millis() as usize);

        let reply: redis::streams::StreamReadReply = conn
            .xread_options(&[stream_key], &[">"], &opts)
            .await
            .map_err(BrokerError::Redis)?;

        let mut out = Vec::new();
        for stream in reply.keys {
            for entry in stream.ids {
                let request_id = entry
                    .map
                    .get("requestId")
                    .and_then(field_to_string)
                    .unwrap_or_default();
                let payload = entry
                    .map
                    .get("payload")
                    .and_then(field_to_string)
                    .unwrap_or_default();
                out.push(StreamRecord {
                    record_id: entry.id,
                    request_id,
                    payload,
                });
            }
        }
        Ok(out)
    }

    pub async fn acknowledge(&self, stream_key: &str, group: &str, record_id: &str) -> BrokerResult<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn
            .xack(stream_key, group, &[record_id])
            .await
            .map_err(BrokerError::Redis)?;
        Ok(())
    }

    pub async fn put_hash(&self, key: &str, fields: HashMap<String, String>) -> BrokerResult<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let pairs: Vec<(String, String)> = fields.into_iter().collect();
        let _: () = conn.hset_multiple(key, &pairs).await.map_err(BrokerError::Redis)?;
        Ok(())
    }

    pub async fn publish_topic(&self, channel: &str, payload: &str) -> BrokerResult<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.publish(channel, payload).await.map_err(BrokerError::Redis)?;
        Ok(())
    }

    pub async fn check_and_mark(&self, key: &str, ttl: Duration) -> IdempotencyResult<bool> {
        let mut conn = self.conn.clone();
        let result: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await
            .map_err(IdempotencyError::Redis)?;
        Ok(result.is_some())
    }

    pub async fn exists(&self, key: &str) -> IdempotencyResult<bool> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(key).await.map_err(IdempotencyError::Redis)?;
        Ok(exists)
    }

    pub async fn get_hash(&self, key: &str) -> BrokerResult<HashMap<String, String>> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn.hgetall(key).await.map_err(BrokerError::Redis)?;
        Ok(fields)
    }

    /// A pub-sub connection is not pooled by `ConnectionManager`; it needs
    /// its own socket held open for the subscription's lifetime (spec §4.8
    /// result subscriber, §5 ordering guarantee).
    pub async fn psubscribe(&self, pattern: &str) -> BrokerResult<redis::aio::PubSub> {
        let mut pubsub = self.client.get_async_pubsub().await.map_err(BrokerError::Redis)?;
        pubsub.psubscribe(pattern).await.map_err(BrokerError::Redis)?;
        Ok(pubsub)
    }
}

fn field_to_string(value: &redis::Value) -> Option<String> {
    match value {
        redis::Value::BulkString(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        redis::Value::SimpleString(s) => Some(s.clone()),
        other => {
            warn!(?other, "unexpected stream field type");
            None
        }
    }
}
