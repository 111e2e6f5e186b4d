use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use redelivery_core::{Delivery, Headers};

/// A record as stored in (and fetched from) a topic partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub topic: String,
    pub partition: u32,
    pub offset: u64,
    pub timestamp: DateTime<Utc>,
    pub key: Option<String>,
    pub headers: Headers,
    pub payload: Vec<u8>,
}

impl LogRecord {
    /// Physical position of this record, for envelope reconstruction.
    ///
    /// The log knows nothing about topic roles, so `attempt` is 0; the consumer sets
    /// it from the topic the record was fetched from.
    pub fn delivery(&self) -> Delivery<'_> {
        Delivery {
            topic: &self.topic,
            partition: self.partition,
            offset: self.offset,
            timestamp: self.timestamp,
            key: self.key.as_deref(),
            attempt: 0,
        }
    }
}

/// A record to be appended.
///
/// When `partition` is `None` the log picks one: by key hash if a key is set,
/// round-robin otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerRecord {
    pub topic: String,
    pub partition: Option<u32>,
    pub key: Option<String>,
    pub headers: Headers,
    pub payload: Vec<u8>,
}

impl ProducerRecord {
    pub fn new(topic: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            topic: topic.into(),
            partition: None,
            key: None,
            headers: Headers::new(),
            payload,
        }
    }

    pub fn with_key(mut self, key: Option<String>) -> Self {
        self.key = key;
        self
    }

    pub fn with_partition(mut self, partition: u32) -> Self {
        self.partition = Some(partition);
        self
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }
}

/// Where an appended record landed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub topic: String,
    pub partition: u32,
    pub offset: u64,
    pub timestamp: DateTime<Utc>,
}
