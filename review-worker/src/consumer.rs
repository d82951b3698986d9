//! C5: Worker Consumer Loop.
//!
//! One task per record (unbounded fan-out, cooperatively scheduled) so a
//! single stalled LLM call never blocks polling for other records. Graceful
//! shutdown signals via `Notify`, then drains the in-flight `JoinSet` up to
//! a configured timeout before force-cancelling (spec §4.5).

use std::sync::Arc;
use std::time::Duration;

use review_broker::BrokerClient;
use review_types::{AsyncReviewRequest, StreamRecord};
use tokio::sync::Notify;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::orchestrator::Orchestrator;

pub struct ConsumerConfig {
    pub stream_key: &'static str,
    pub group: String,
    pub consumer_id: String,
    pub batch_size: usize,
    pub block_for: Duration,
    pub drain_timeout: Duration,
}

impl ConsumerConfig {
    /// `consumerId` defaults to `"worker-" + pid` (spec §4.5).
    pub fn new(stream_key: &'static str, group: impl Into<String>) -> Self {
        Self {
            stream_key,
            group: group.into(),
            consumer_id: format!("worker-{}", std::process::id()),
            batch_size: 10,
            block_for: Duration::from_secs(5),
            drain_timeout: Duration::from_secs(30),
        }
    }
}

pub struct WorkerLoop {
    config: ConsumerConfig,
    broker: BrokerClient,
    orchestrator: Arc<Orchestrator>,
    shutdown: Arc<Notify>,
}

impl WorkerLoop {
    pub fn new(config: ConsumerConfig, broker: BrokerClient, orchestrator: Arc<Orchestrator>) -> Self {
        Self { config, broker, orchestrator, shutdown: Arc::new(Notify::new()) }
    }

    /// A handle that, when notified, stops the loop from polling for new
    /// batches (in-flight tasks still get their drain window).
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Ensures the consumer group exists, then long-polls until shutdown is
    /// signalled, spawning one task per record.
    pub async fn run(&self) -> Result<(), review_broker::errors::BrokerError> {
        self.broker.ensure_group(self.config.stream_key, &self.config.group).await?;
        info!(stream = self.config.stream_key, group = %self.config.group, consumer = %self.config.consumer_id, "worker loop started");

        let mut tasks = JoinSet::new();

        loop {
            let poll = self.broker.read_batch(
                self.config.stream_key,
                &self.config.group,
                &self.config.consumer_id,
                self.config.batch_size,
                self.config.block_for,
            );

            tokio::select! {
                _ = self.shutdown.notified() => {
                    info!("shutdown signalled, draining in-flight tasks");
                    break;
                }
                batch = poll => {
                    for record in batch? {
                        let broker = self.broker.clone();
                        let orchestrator = self.orchestrator.clone();
                        let stream_key = self.config.stream_key;
                        let group = self.config.group.clone();
                        tasks.spawn(async move {
                            handle_record(broker, orchestrator, stream_key, &group, record).await;
                        });
                    }
                }
            }
        }

        drain(&mut tasks, self.config.drain_timeout).await;
        Ok(())
    }
}

/// Parses the record's payload, invokes the orchestrator, and
/// acknowledges on success or poison-pill drop; leaves the record
/// pending (for broker-driven redelivery) on a transient orchestrator
/// failure (spec §4.5 step 3, §7).
async fn handle_record(
    broker: BrokerClient,
    orchestrator: Arc<Orchestrator>,
    stream_key: &'static str,
    group: &str,
    record: StreamRecord,
) {
    let request: AsyncReviewRequest = match serde_json::from_str(&record.payload) {
        Ok(r) => r,
        Err(e) => {
            error!(record_id = %record.record_id, error = %e, "poison pill: dropping unparseable record");
            if let Err(ack_err) = broker.acknowledge(stream_key, group, &record.record_id).await {
                error!(record_id = %record.record_id, error = %ack_err, "failed to acknowledge poison pill");
            }
            return;
        }
    };

    match orchestrator.process(request).await {
        Ok(()) => {
            if let Err(e) = broker.acknowledge(stream_key, group, &record.record_id).await {
                error!(record_id = %record.record_id, error = %e, "failed to acknowledge completed record");
            }
        }
        Err(e) => {
            warn!(record_id = %record.record_id, error = %e, "orchestrator failed, leaving record pending for redelivery");
        }
    }
}

async fn drain(tasks: &mut JoinSet<()>, timeout: Duration) {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if tasks.is_empty() {
            return;
        }
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            warn!(count = tasks.len(), "drain timeout exceeded, force-cancelling remaining tasks");
            tasks.shutdown().await;
            return;
        }
        tokio::select! {
            _ = tasks.join_next() => {}
            _ = tokio::time::sleep(remaining) => {
                warn!(count = tasks.len(), "drain timeout exceeded, force-cancelling remaining tasks");
                tasks.shutdown().await;
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consumer_config_defaults_consumer_id_to_worker_plus_pid() {
        let cfg = ConsumerConfig::new("review:requests", "workers");
        assert_eq!(cfg.consumer_id, format!("worker-{}", std::process::id()));
        assert_eq!(cfg.batch_size, 10);
    }
}
