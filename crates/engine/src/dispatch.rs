//! Partition workers.
//!
//! One worker per (topic, partition). A worker resumes from the group's committed
//! offset, fetches batches in order and hands each record to its processor. The
//! offset is committed only after the processor has finished with the record,
//! which for a failure means after the hand-off to the next topic was appended.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use redelivery_core::{FailureClassifier, Outcome, RouteDecision, Router, TopicRole};
use redelivery_log::{LogRecord, PayloadCodec, RecordLog};

use crate::handler::{RecordHandler, invoke_guarded};
use crate::scheduler::BackoffScheduler;
use crate::shutdown::ShutdownSignal;
use crate::stats::SharedStats;
use crate::wire;

/// Per-record processing step run by a [`PartitionWorker`].
#[async_trait]
pub(crate) trait PartitionProcessor: Send + Sync {
    /// Returns `false` when the record must stay uncommitted (shutdown came first).
    async fn process(&self, record: &LogRecord, shutdown: &mut ShutdownSignal) -> bool;
}

pub(crate) struct PartitionWorker {
    pub(crate) log: Arc<dyn RecordLog>,
    pub(crate) group: String,
    pub(crate) topic: String,
    pub(crate) partition: u32,
    pub(crate) fetch_max: usize,
    pub(crate) poll_interval: Duration,
}

impl PartitionWorker {
    pub(crate) async fn run(
        self,
        processor: Arc<dyn PartitionProcessor>,
        mut shutdown: ShutdownSignal,
    ) {
        let Self {
            log,
            group,
            topic,
            partition,
            fetch_max,
            poll_interval,
        } = self;

        let mut next = match log.committed(&group, &topic, partition).await {
            Ok(offset) => offset,
            Err(err) => {
                warn!(
                    %group, %topic, partition, error = %err,
                    "could not read committed offset; starting from 0"
                );
                0
            }
        };
        debug!(%group, %topic, partition, from = next, "partition worker started");

        'poll: loop {
            if shutdown.is_triggered() {
                break;
            }

            let batch = match log.fetch(&topic, partition, next, fetch_max).await {
                Ok(batch) => batch,
                Err(err) => {
                    warn!(%topic, partition, error = %err, "fetch failed");
                    if !shutdown.sleep(poll_interval).await {
                        break;
                    }
                    continue;
                }
            };

            if batch.is_empty() {
                if !shutdown.sleep(poll_interval).await {
                    break;
                }
                continue;
            }

            for record in batch {
                if shutdown.is_triggered() || !processor.process(&record, &mut shutdown).await {
                    break 'poll;
                }
                next = record.offset + 1;
                if let Err(err) = log.commit(&group, &topic, partition, next).await {
                    // Not fatal: the record is redelivered after a restart.
                    error!(
                        %group, %topic, partition, offset = record.offset, error = %err,
                        "commit failed"
                    );
                }
            }
        }

        debug!(%group, %topic, partition, next, "partition worker stopped");
    }
}

/// Processes deliveries on the subject and its retry topics.
pub(crate) struct AttemptProcessor<P> {
    pub(crate) role: TopicRole,
    pub(crate) router: Arc<Router>,
    pub(crate) handler: Arc<dyn RecordHandler<P>>,
    pub(crate) classifier: Arc<dyn FailureClassifier>,
    pub(crate) codec: Arc<dyn PayloadCodec<P>>,
    pub(crate) log: Arc<dyn RecordLog>,
    pub(crate) scheduler: BackoffScheduler,
    pub(crate) partition_counts: Arc<HashMap<String, u32>>,
    pub(crate) stats: SharedStats,
    pub(crate) poll_interval: Duration,
}

impl<P> AttemptProcessor<P>
where
    P: Send + Sync + 'static,
{
    fn attempt(&self, inbound: &wire::Inbound) -> anyhow::Result<()> {
        if let Some(err) = &inbound.malformed {
            return Err(anyhow::Error::new(err.clone()).context("malformed record headers"));
        }
        let typed = inbound
            .envelope
            .try_map_ref(|bytes| self.codec.decode(bytes))?;
        invoke_guarded(|| self.handler.handle(&typed))
    }

    /// Append the routed envelope to its next topic, retrying until it sticks.
    async fn hand_off(
        &self,
        decision: RouteDecision<Vec<u8>>,
        shutdown: &mut ShutdownSignal,
    ) -> bool {
        let (envelope, delay) = match &decision {
            RouteDecision::Retry { envelope, delay } => (envelope, Some(*delay)),
            RouteDecision::DeadLetter { envelope } => (envelope, None),
        };
        let partitions = self
            .partition_counts
            .get(envelope.received_topic())
            .copied()
            .unwrap_or(1);

        loop {
            let record = wire::to_producer_record(envelope, partitions);
            let appended = match delay {
                Some(delay) => self.scheduler.schedule(record, delay).await,
                None => self.log.append(record).await,
            };

            match appended {
                Ok(meta) => {
                    let exception = envelope
                        .exception()
                        .map(|e| e.message.as_str())
                        .unwrap_or_default();
                    match delay {
                        Some(delay) => {
                            debug!(
                                record_id = %envelope.record_id(),
                                topic = %meta.topic,
                                partition = meta.partition,
                                offset = meta.offset,
                                attempt = envelope.attempt(),
                                delay_ms = delay.as_millis() as u64,
                                exception,
                                "retry scheduled"
                            );
                            self.stats.update(|s| s.retried += 1);
                        }
                        None => {
                            warn!(
                                record_id = %envelope.record_id(),
                                topic = %meta.topic,
                                partition = meta.partition,
                                offset = meta.offset,
                                attempts = envelope.attempts_made(),
                                exception,
                                "record dead-lettered"
                            );
                            self.stats.update(|s| s.dead_lettered += 1);
                        }
                    }
                    return true;
                }
                Err(err) => {
                    error!(
                        record_id = %envelope.record_id(),
                        topic = envelope.received_topic(),
                        error = %err,
                        "hand-off append failed; will retry"
                    );
                    self.stats.update(|s| s.handoff_failures += 1);
                    if !shutdown.sleep(self.poll_interval).await {
                        return false;
                    }
                }
            }
        }
    }
}

#[async_trait]
impl<P> PartitionProcessor for AttemptProcessor<P>
where
    P: Send + Sync + 'static,
{
    async fn process(&self, record: &LogRecord, shutdown: &mut ShutdownSignal) -> bool {
        if matches!(self.role, TopicRole::Retry(_))
            && !BackoffScheduler::hold_until_due(record, shutdown).await
        {
            return false;
        }

        let max_attempts = self.router.topology().max_attempts();
        let inbound = match wire::read_envelope(record, self.role, max_attempts) {
            Ok(inbound) => inbound,
            Err(err) => {
                error!(
                    topic = %record.topic,
                    partition = record.partition,
                    offset = record.offset,
                    error = %err,
                    "unreadable record skipped"
                );
                return true;
            }
        };

        let result = self.attempt(&inbound);
        self.stats.update(|s| s.processed += 1);

        let envelope = inbound.envelope;
        let outcome = Outcome::classify(&result, self.classifier.as_ref());
        let Some((kind, message)) = outcome.failure() else {
            info!(
                record_id = %envelope.record_id(),
                key = envelope.key().unwrap_or_default(),
                topic = envelope.received_topic(),
                partition = envelope.partition(),
                offset = envelope.offset(),
                attempt = envelope.attempt(),
                "record processed"
            );
            self.stats.update(|s| s.succeeded += 1);
            return true;
        };

        let decision = self.router.route(envelope, kind, message);
        self.hand_off(decision, shutdown).await
    }
}
