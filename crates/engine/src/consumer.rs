//! Consumer wiring: provisions topics and spawns one worker per (topic, partition).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use redelivery_core::{FailureClassifier, RetryAll, Router, TopicRole, TopicTopology};
use redelivery_log::{PayloadCodec, RecordLog};

use crate::config::ConsumerConfig;
use crate::dead_letter::DeadLetterProcessor;
use crate::dispatch::{AttemptProcessor, PartitionProcessor, PartitionWorker};
use crate::error::{EngineError, EngineResult};
use crate::handler::{DeadLetterHandler, LogDeadLetters, RecordHandler};
use crate::scheduler::BackoffScheduler;
use crate::shutdown::{self, ShutdownSignal};
use crate::stats::{ConsumerStats, SharedStats};

/// A retrying consumer for one subject and consumer group.
///
/// ```text
/// {subject} ──fail──► {subject}-retry-0 ──fail──► … ──fail──► {subject}-dlt
///     │                    │                                     │
///  handler              handler (after backoff)          dead-letter handler
/// ```
pub struct RetryingConsumer<P> {
    config: ConsumerConfig,
    log: Arc<dyn RecordLog>,
    codec: Arc<dyn PayloadCodec<P>>,
    handler: Option<Arc<dyn RecordHandler<P>>>,
    dead_letter_handler: Arc<dyn DeadLetterHandler<P>>,
    classifier: Arc<dyn FailureClassifier>,
}

impl<P> RetryingConsumer<P>
where
    P: Send + Sync + 'static,
{
    pub fn new<L, C>(config: ConsumerConfig, log: Arc<L>, codec: C) -> Self
    where
        L: RecordLog + 'static,
        C: PayloadCodec<P> + 'static,
    {
        Self {
            config,
            log,
            codec: Arc::new(codec),
            handler: None,
            dead_letter_handler: Arc::new(LogDeadLetters),
            classifier: Arc::new(RetryAll),
        }
    }

    pub fn handler(mut self, handler: impl RecordHandler<P> + 'static) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    pub fn dead_letter_handler(mut self, handler: impl DeadLetterHandler<P> + 'static) -> Self {
        self.dead_letter_handler = Arc::new(handler);
        self
    }

    pub fn classifier(mut self, classifier: impl FailureClassifier + 'static) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    /// Provision topics and start every partition worker.
    pub async fn start(self) -> EngineResult<ConsumerHandle> {
        let handler = self.handler.ok_or(EngineError::MissingHandler)?;
        self.config.validate()?;

        let router = Arc::new(Router::new(&self.config.subject, &self.config.policy)?);
        let topology = router.topology().clone();

        let mut partition_counts = HashMap::new();
        for topic in topology.all_topics() {
            self.log.create_topic(&topic, self.config.partitions).await?;
            let count = self.log.partition_count(&topic).await?;
            partition_counts.insert(topic, count);
        }
        let partition_counts = Arc::new(partition_counts);

        info!(
            subject = topology.subject(),
            group = %self.config.group_id,
            bootstrap = %self.config.bootstrap,
            max_attempts = topology.max_attempts(),
            topics = ?topology.all_topics(),
            "starting retrying consumer"
        );

        let (trigger, signal) = shutdown::channel();
        let stats = SharedStats::default();
        let scheduler = BackoffScheduler::new(self.log.clone());
        let mut workers = Vec::new();

        for topic in topology.all_topics() {
            let Some(role) = topology.role_of(&topic) else {
                continue;
            };

            let processor: Arc<dyn PartitionProcessor> = match role {
                TopicRole::DeadLetter => Arc::new(DeadLetterProcessor {
                    handler: self.dead_letter_handler.clone(),
                    codec: self.codec.clone(),
                    stats: stats.clone(),
                    max_attempts: topology.max_attempts(),
                }),
                TopicRole::Main | TopicRole::Retry(_) => Arc::new(AttemptProcessor {
                    role,
                    router: router.clone(),
                    handler: handler.clone(),
                    classifier: self.classifier.clone(),
                    codec: self.codec.clone(),
                    log: self.log.clone(),
                    scheduler: scheduler.clone(),
                    partition_counts: partition_counts.clone(),
                    stats: stats.clone(),
                    poll_interval: self.config.poll_interval,
                }),
            };

            let partitions = partition_counts
                .get(&topic)
                .copied()
                .unwrap_or(self.config.partitions);
            for partition in 0..partitions {
                let worker = PartitionWorker {
                    log: self.log.clone(),
                    group: self.config.group_id.clone(),
                    topic: topic.clone(),
                    partition,
                    fetch_max: self.config.fetch_max,
                    poll_interval: self.config.poll_interval,
                };
                workers.push(tokio::spawn(worker.run(processor.clone(), signal.clone())));
            }
        }

        Ok(ConsumerHandle {
            trigger,
            signal,
            workers,
            stats,
            topology,
        })
    }
}

/// Handle to a running consumer.
///
/// Dropping the handle also stops the workers, without waiting for them.
#[derive(Debug)]
pub struct ConsumerHandle {
    trigger: watch::Sender<bool>,
    signal: ShutdownSignal,
    workers: Vec<JoinHandle<()>>,
    stats: SharedStats,
    topology: TopicTopology,
}

impl ConsumerHandle {
    /// Stop all workers between records and wait for them to finish.
    ///
    /// Records not yet committed are redelivered to the next consumer in the group.
    pub async fn shutdown(self) {
        let _ = self.trigger.send(true);
        for worker in self.workers {
            if let Err(err) = worker.await {
                warn!(error = %err, "partition worker ended abnormally");
            }
        }
        info!(subject = self.topology.subject(), "retrying consumer stopped");
    }

    pub fn stats(&self) -> ConsumerStats {
        self.stats.snapshot()
    }

    /// Stats view that outlives `&self`, for sharing with other components.
    pub fn shared_stats(&self) -> SharedStats {
        self.stats.clone()
    }

    pub fn topology(&self) -> &TopicTopology {
        &self.topology
    }

    /// Signal that fires when this consumer is asked to stop.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.signal.clone()
    }
}
