//! In-process broker backend used by tests and by the `InMemory` idempotency
//! keeper variant. Mirrors the Redis semantics closely enough that callers
//! written against [`crate::client::BrokerClient`] behave the same either way.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use review_types::StreamRecord;
use tokio::sync::broadcast;

use crate::errors::{BrokerError, BrokerResult, IdempotencyError, IdempotencyResult};

struct StreamState {
    next_id: u64,
    entries: VecDeque<StreamRecord>,
    groups: HashSet<String>,
    /// (group, record_id) -> record, pending until acknowledged.
    pending: HashMap<(String, String), StreamRecord>,
}

impl StreamState {
    fn new() -> Self {
        Self {
            next_id: 0,
            entries: VecDeque::new(),
            groups: HashSet::new(),
            pending: HashMap::new(),
        }
    }
}

pub struct InMemoryBroker {
    streams: Mutex<HashMap<String, StreamState>>,
    hashes: Mutex<HashMap<String, HashMap<String, String>>>,
    topics: Mutex<HashMap<String, broadcast::Sender<(String, String)>>>,
    claims: Mutex<HashMap<String, Instant>>,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self {
            streams: Mutex::new(HashMap::new()),
            hashes: Mutex::new(HashMap::new()),
            topics: Mutex::new(HashMap::new()),
            claims: Mutex::new(HashMap::new()),
        }
    }

    pub fn publish(&self, stream_key: &str, request_id: &str, payload: &str) -> BrokerResult<String> {
        let mut streams = self.streams.lock().unwrap();
        let state = streams.entry(stream_key.to_string()).or_insert_with(StreamState::new);
        state.next_id += 1;
        let record_id = format!("{}-0", state.next_id);
        state.entries.push_back(StreamRecord {
            record_id: record_id.clone(),
            request_id: request_id.to_string(),
            payload: payload.to_string(),
        });
        Ok(record_id)
    }

    pub fn ensure_group(&self, stream_key: &str, group: &str) -> BrokerResult<()> {
        let mut streams = self.streams.lock().unwrap();
        let state = streams.entry(stream_key.to_string()).or_insert_with(StreamState::new);
        state.groups.insert(group.to_string());
        Ok(())
    }

    pub fn read_batch(
        &self,
        stream_key: &str,
        group: &str,
        max_count: usize,
    ) -> BrokerResult<Vec<StreamRecord>> {
        let mut streams = self.streams.lock().unwrap();
        let Some(state) = streams.get_mut(stream_key) else {
            return Ok(Vec::new());
        };
        if !state.groups.contains(group) {
            return Err(BrokerError::Unavailable(format!(
                "consumer group {group} does not exist on {stream_key}"
            )));
        }
        let mut out = Vec::new();
        while out.len() < max_count {
            let Some(record) = state.entries.pop_front() else {
                break;
            };
            state
                .pending
                .insert((group.to_string(), record.record_id.clone()), record.clone());
            out.push(record);
        }
        Ok(out)
    }

    pub fn acknowledge(&self, stream_key: &str, group: &str, record_id: &str) -> BrokerResult<()> {
        let mut streams = self.streams.lock().unwrap();
        if let Some(state) = streams.get_mut(stream_key) {
            state.pending.remove(&(group.to_string(), record_id.to_string()));
        }
        Ok(())
    }

    pub fn pending_count(&self, stream_key: &str, group: &str) -> usize {
        let streams = self.streams.lock().unwrap();
        streams
            .get(stream_key)
            .map(|s| s.pending.keys().filter(|(g, _)| g == group).count())
            .unwrap_or(0)
    }

    pub fn put_hash(&self, key: &str, fields: HashMap<String, String>) -> BrokerResult<()> {
        let mut hashes = self.hashes.lock().unwrap();
        hashes.entry(key.to_string()).or_default().extend(fields);
        Ok(())
    }

    pub fn get_hash(&self, key: &str) -> Option<HashMap<String, String>> {
        self.hashes.lock().unwrap().get(key).cloned()
    }

    pub fn publish_topic(&self, channel: &str, payload: &str) -> BrokerResult<()> {
        let topics = self.topics.lock().unwrap();
        if let Some(tx) = topics.get(channel) {
            let _ = tx.send((channel.to_string(), payload.to_string()));
        }
        Ok(())
    }

    pub fn subscribe(&self, channel: &str) -> broadcast::Receiver<(String, String)> {
        let mut topics = self.topics.lock().unwrap();
        topics
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(256).0)
            .subscribe()
    }

    pub fn check_and_mark(&self, key: &str, ttl: Duration) -> IdempotencyResult<bool> {
        let mut claims = self.claims.lock().unwrap();
        let now = Instant::now();
        claims.retain(|_, claimed_at| now.duration_since(*claimed_at) < ttl);
        if claims.contains_key(key) {
            return Ok(false);
        }
        claims.insert(key.to_string(), now);
        Ok(true)
    }

    pub fn exists(&self, key: &str) -> IdempotencyResult<bool> {
        Ok(self.claims.lock().unwrap().contains_key(key))
    }
}
