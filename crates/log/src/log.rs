//! Partitioned log abstraction (mechanics only).
//!
//! The engine talks to the underlying log through [`RecordLog`]. The contract is the
//! one every partitioned, append-only log offers:
//!
//! - **Append-only partitions**: offsets within a partition are dense and increasing
//! - **Partition-local ordering**: records are fetched in append order per partition
//! - **Consumer-group offsets**: progress is committed per (group, topic, partition)
//! - **At-least-once**: anything past the committed offset is fetched again after a restart
//!
//! The log's append and commit are the only synchronization points between workers.
//! Durability belongs to the implementation, not to the engine.

use std::sync::Arc;

use async_trait::async_trait;

use crate::record::{LogRecord, ProducerRecord, RecordMetadata};

pub type LogResult<T> = Result<T, LogError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LogError {
    #[error("unknown topic: {0}")]
    UnknownTopic(String),

    #[error("unknown partition {partition} for topic {topic}")]
    UnknownPartition { topic: String, partition: u32 },

    #[error("invalid topic configuration: {0}")]
    InvalidTopic(String),

    /// The backend could not serve the request (connection loss, broker down, ...).
    #[error("log unavailable: {0}")]
    Unavailable(String),

    /// Internal lock poisoning.
    #[error("log state poisoned")]
    Poisoned,
}

/// Domain-agnostic partitioned log.
///
/// Implementations must be safe to share across tasks; one worker per partition
/// calls `fetch`/`commit` while any number of producers call `append`.
#[async_trait]
pub trait RecordLog: Send + Sync {
    /// Create `topic` with `partitions` partitions. Existing topics are left untouched.
    async fn create_topic(&self, topic: &str, partitions: u32) -> LogResult<()>;

    async fn partition_count(&self, topic: &str) -> LogResult<u32>;

    async fn append(&self, record: ProducerRecord) -> LogResult<RecordMetadata>;

    /// Fetch up to `max` records starting at offset `from`. Empty when caught up.
    async fn fetch(
        &self,
        topic: &str,
        partition: u32,
        from: u64,
        max: usize,
    ) -> LogResult<Vec<LogRecord>>;

    /// Record that `group` has consumed everything before `next_offset`.
    async fn commit(&self, group: &str, topic: &str, partition: u32, next_offset: u64)
    -> LogResult<()>;

    /// Next offset `group` should read (zero if nothing was committed).
    async fn committed(&self, group: &str, topic: &str, partition: u32) -> LogResult<u64>;
}

#[async_trait]
impl<L> RecordLog for Arc<L>
where
    L: RecordLog + ?Sized,
{
    async fn create_topic(&self, topic: &str, partitions: u32) -> LogResult<()> {
        (**self).create_topic(topic, partitions).await
    }

    async fn partition_count(&self, topic: &str) -> LogResult<u32> {
        (**self).partition_count(topic).await
    }

    async fn append(&self, record: ProducerRecord) -> LogResult<RecordMetadata> {
        (**self).append(record).await
    }

    async fn fetch(
        &self,
        topic: &str,
        partition: u32,
        from: u64,
        max: usize,
    ) -> LogResult<Vec<LogRecord>> {
        (**self).fetch(topic, partition, from, max).await
    }

    async fn commit(
        &self,
        group: &str,
        topic: &str,
        partition: u32,
        next_offset: u64,
    ) -> LogResult<()> {
        (**self).commit(group, topic, partition, next_offset).await
    }

    async fn committed(&self, group: &str, topic: &str, partition: u32) -> LogResult<u64> {
        (**self).committed(group, topic, partition).await
    }
}
