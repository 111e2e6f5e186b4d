//! In-memory partitioned log for tests/dev.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use crate::log::{LogError, LogResult, RecordLog};
use crate::record::{LogRecord, ProducerRecord, RecordMetadata};

#[derive(Debug, Default)]
struct Topic {
    partitions: Vec<Vec<LogRecord>>,
    next_round_robin: u32,
}

#[derive(Debug, Default)]
struct LogState {
    topics: HashMap<String, Topic>,
    commits: HashMap<(String, String, u32), u64>,
    injected_failures: HashMap<String, u32>,
}

/// In-memory partitioned log.
///
/// - No IO; a single lock guards all partitions
/// - Topics are created on first append when missing (with `default_partitions`)
/// - Nothing survives the process, so durability is only as good as the caller's `Arc`
#[derive(Debug)]
pub struct InMemoryLog {
    state: Mutex<LogState>,
    default_partitions: u32,
}

impl InMemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Partition count used when an append auto-creates a topic.
    pub fn with_default_partitions(partitions: u32) -> Self {
        Self {
            state: Mutex::new(LogState::default()),
            default_partitions: partitions.max(1),
        }
    }

    /// Make the next `count` appends to `topic` fail with [`LogError::Unavailable`].
    pub fn inject_append_failures(&self, topic: impl Into<String>, count: u32) {
        if let Ok(mut state) = self.state.lock() {
            state.injected_failures.insert(topic.into(), count);
        }
    }

    /// Every record in `topic`, partition by partition, in offset order.
    pub fn records(&self, topic: &str) -> Vec<LogRecord> {
        let Ok(state) = self.state.lock() else {
            return Vec::new();
        };
        state
            .topics
            .get(topic)
            .map(|t| t.partitions.iter().flatten().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of records in `topic` across all partitions.
    pub fn len(&self, topic: &str) -> usize {
        let Ok(state) = self.state.lock() else {
            return 0;
        };
        state
            .topics
            .get(topic)
            .map(|t| t.partitions.iter().map(Vec::len).sum())
            .unwrap_or(0)
    }

    pub fn topic_names(&self) -> Vec<String> {
        let Ok(state) = self.state.lock() else {
            return Vec::new();
        };
        let mut names: Vec<_> = state.topics.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for InMemoryLog {
    fn default() -> Self {
        Self::with_default_partitions(1)
    }
}

fn partition_for_key(key: &str, partitions: u32) -> u32 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() % u64::from(partitions)) as u32
}

#[async_trait]
impl RecordLog for InMemoryLog {
    async fn create_topic(&self, topic: &str, partitions: u32) -> LogResult<()> {
        if partitions == 0 {
            return Err(LogError::InvalidTopic(format!(
                "{topic}: partition count must be positive"
            )));
        }
        let mut state = self.state.lock().map_err(|_| LogError::Poisoned)?;
        state.topics.entry(topic.to_string()).or_insert_with(|| {
            debug!(topic, partitions, "created topic");
            Topic {
                partitions: vec![Vec::new(); partitions as usize],
                next_round_robin: 0,
            }
        });
        Ok(())
    }

    async fn partition_count(&self, topic: &str) -> LogResult<u32> {
        let state = self.state.lock().map_err(|_| LogError::Poisoned)?;
        state
            .topics
            .get(topic)
            .map(|t| t.partitions.len() as u32)
            .ok_or_else(|| LogError::UnknownTopic(topic.to_string()))
    }

    async fn append(&self, record: ProducerRecord) -> LogResult<RecordMetadata> {
        let mut state = self.state.lock().map_err(|_| LogError::Poisoned)?;

        if let Some(remaining) = state.injected_failures.get_mut(&record.topic) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(LogError::Unavailable(format!(
                    "injected append failure for {}",
                    record.topic
                )));
            }
        }

        let default_partitions = self.default_partitions;
        let topic = state
            .topics
            .entry(record.topic.clone())
            .or_insert_with(|| Topic {
                partitions: vec![Vec::new(); default_partitions as usize],
                next_round_robin: 0,
            });
        let count = topic.partitions.len() as u32;

        let partition = match (record.partition, record.key.as_deref()) {
            (Some(p), _) if p < count => p,
            (Some(p), _) => {
                return Err(LogError::UnknownPartition {
                    topic: record.topic,
                    partition: p,
                });
            }
            (None, Some(key)) => partition_for_key(key, count),
            (None, None) => {
                let p = topic.next_round_robin % count;
                topic.next_round_robin = topic.next_round_robin.wrapping_add(1);
                p
            }
        };

        let log = &mut topic.partitions[partition as usize];
        let offset = log.len() as u64;
        let timestamp = Utc::now();
        log.push(LogRecord {
            topic: record.topic.clone(),
            partition,
            offset,
            timestamp,
            key: record.key,
            headers: record.headers,
            payload: record.payload,
        });

        Ok(RecordMetadata {
            topic: record.topic,
            partition,
            offset,
            timestamp,
        })
    }

    async fn fetch(
        &self,
        topic: &str,
        partition: u32,
        from: u64,
        max: usize,
    ) -> LogResult<Vec<LogRecord>> {
        let state = self.state.lock().map_err(|_| LogError::Poisoned)?;
        let t = state
            .topics
            .get(topic)
            .ok_or_else(|| LogError::UnknownTopic(topic.to_string()))?;
        let log = t
            .partitions
            .get(partition as usize)
            .ok_or_else(|| LogError::UnknownPartition {
                topic: topic.to_string(),
                partition,
            })?;

        Ok(log.iter().skip(from as usize).take(max).cloned().collect())
    }

    async fn commit(
        &self,
        group: &str,
        topic: &str,
        partition: u32,
        next_offset: u64,
    ) -> LogResult<()> {
        let mut state = self.state.lock().map_err(|_| LogError::Poisoned)?;
        let slot = state
            .commits
            .entry((group.to_string(), topic.to_string(), partition))
            .or_insert(0);
        // Commits never move backwards.
        *slot = (*slot).max(next_offset);
        Ok(())
    }

    async fn committed(&self, group: &str, topic: &str, partition: u32) -> LogResult<u64> {
        let state = self.state.lock().map_err(|_| LogError::Poisoned)?;
        Ok(state
            .commits
            .get(&(group.to_string(), topic.to_string(), partition))
            .copied()
            .unwrap_or(0))
    }
}
