use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::headers::{self, Headers};
use crate::id::RecordId;

/// How a failure is treated by the router.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Transient; eligible for another attempt.
    Retryable,
    /// Permanent; routed straight to the dead-letter topic.
    Fatal,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::Retryable => "retryable",
            FailureKind::Fatal => "fatal",
        }
    }
}

impl core::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for FailureKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "retryable" => Ok(FailureKind::Retryable),
            "fatal" => Ok(FailureKind::Fatal),
            other => Err(CoreError::invalid_header(headers::EXCEPTION_KIND, other)),
        }
    }
}

/// Last failure observed for a record, carried into later deliveries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionContext {
    pub kind: FailureKind,
    pub message: String,
    /// Physical topic of the delivery that failed.
    pub topic: String,
}

impl ExceptionContext {
    pub fn new(kind: FailureKind, message: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            topic: topic.into(),
        }
    }
}

/// Physical position a delivery was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery<'a> {
    pub topic: &'a str,
    pub partition: u32,
    pub offset: u64,
    pub timestamp: DateTime<Utc>,
    pub key: Option<&'a str>,
    /// Attempt encoded by the topic this delivery was read from. Used when the record
    /// carries no `attempt` header.
    pub attempt: u32,
}

/// Envelope for a record, containing routing and attempt metadata.
///
/// This is the unit that moves through the pipeline.
///
/// Notes:
/// - `attempt` is zero-based and only ever grows, by exactly one per redelivery.
/// - `original_*` fields are fixed at first publish and survive every re-publish.
/// - `received_topic`/`partition`/`offset` describe the current physical delivery.
/// - `payload` is opaque to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordEnvelope<P> {
    record_id: RecordId,
    key: Option<String>,

    original_topic: String,
    original_partition: u32,
    original_offset: u64,
    original_timestamp: DateTime<Utc>,

    received_topic: String,
    partition: u32,
    offset: u64,

    attempt: u32,
    exception: Option<ExceptionContext>,

    payload: P,
}

impl<P> RecordEnvelope<P> {
    /// A fresh envelope for a record about to be published to `subject`.
    ///
    /// Position fields are zero until the record is actually delivered.
    pub fn new(subject: impl Into<String>, key: Option<String>, payload: P) -> Self {
        let subject = subject.into();
        Self {
            record_id: RecordId::new(),
            key,
            original_topic: subject.clone(),
            original_partition: 0,
            original_offset: 0,
            original_timestamp: Utc::now(),
            received_topic: subject,
            partition: 0,
            offset: 0,
            attempt: 0,
            exception: None,
            payload,
        }
    }

    /// Rebuild an envelope from a physical delivery and its wire headers.
    ///
    /// Records written by external producers carry no headers; they originate at the
    /// delivery position and take their attempt from `delivery.attempt`.
    pub fn from_delivery(delivery: Delivery<'_>, wire: &Headers, payload: P) -> CoreResult<Self> {
        let record_id = match wire.parse::<RecordId>(headers::RECORD_ID)? {
            Some(id) => id,
            None => RecordId::from_position(delivery.topic, delivery.partition, delivery.offset),
        };

        let original_timestamp = match wire.parse::<i64>(headers::ORIGINAL_TIMESTAMP)? {
            Some(ms) => DateTime::<Utc>::from_timestamp_millis(ms).ok_or_else(|| {
                CoreError::invalid_header(headers::ORIGINAL_TIMESTAMP, ms.to_string())
            })?,
            None => delivery.timestamp,
        };

        let exception = match wire.parse::<FailureKind>(headers::EXCEPTION_KIND)? {
            Some(kind) => Some(ExceptionContext {
                kind,
                message: wire
                    .get(headers::EXCEPTION_MESSAGE)
                    .unwrap_or_default()
                    .to_string(),
                topic: wire
                    .get(headers::EXCEPTION_TOPIC)
                    .unwrap_or_default()
                    .to_string(),
            }),
            None => None,
        };

        Ok(Self {
            record_id,
            key: delivery.key.map(str::to_string),
            original_topic: wire
                .get(headers::ORIGINAL_TOPIC)
                .unwrap_or(delivery.topic)
                .to_string(),
            original_partition: wire
                .parse(headers::ORIGINAL_PARTITION)?
                .unwrap_or(delivery.partition),
            original_offset: wire
                .parse(headers::ORIGINAL_OFFSET)?
                .unwrap_or(delivery.offset),
            original_timestamp,
            received_topic: delivery.topic.to_string(),
            partition: delivery.partition,
            offset: delivery.offset,
            attempt: wire.parse(headers::ATTEMPT)?.unwrap_or(delivery.attempt),
            exception,
            payload,
        })
    }

    /// Wire headers describing this envelope.
    ///
    /// `offset` is the position of the delivery this envelope was last read from.
    pub fn to_headers(&self) -> Headers {
        let mut h = Headers::new()
            .with(headers::RECORD_ID, self.record_id)
            .with(headers::RECEIVED_TOPIC, &self.received_topic)
            .with(headers::OFFSET, self.offset)
            .with(headers::ATTEMPT, self.attempt)
            .with(
                headers::ORIGINAL_TIMESTAMP,
                self.original_timestamp.timestamp_millis(),
            )
            .with(headers::ORIGINAL_TOPIC, &self.original_topic)
            .with(headers::ORIGINAL_PARTITION, self.original_partition)
            .with(headers::ORIGINAL_OFFSET, self.original_offset);

        if let Some(ex) = &self.exception {
            h.insert(headers::EXCEPTION_KIND, ex.kind);
            h.insert(headers::EXCEPTION_MESSAGE, &ex.message);
            h.insert(headers::EXCEPTION_TOPIC, &ex.topic);
        }
        h
    }

    pub fn record_id(&self) -> RecordId {
        self.record_id
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn original_topic(&self) -> &str {
        &self.original_topic
    }

    pub fn original_partition(&self) -> u32 {
        self.original_partition
    }

    pub fn original_offset(&self) -> u64 {
        self.original_offset
    }

    pub fn original_timestamp(&self) -> DateTime<Utc> {
        self.original_timestamp
    }

    pub fn received_topic(&self) -> &str {
        &self.received_topic
    }

    pub fn partition(&self) -> u32 {
        self.partition
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Zero-based index of the current attempt.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Number of processing attempts represented by this envelope, including the current one.
    pub fn attempts_made(&self) -> u32 {
        self.attempt.saturating_add(1)
    }

    pub fn exception(&self) -> Option<&ExceptionContext> {
        self.exception.as_ref()
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }

    pub fn into_payload(self) -> P {
        self.payload
    }

    /// Swap the payload, keeping all metadata.
    pub fn map<Q>(self, f: impl FnOnce(P) -> Q) -> RecordEnvelope<Q> {
        let RecordEnvelope {
            record_id,
            key,
            original_topic,
            original_partition,
            original_offset,
            original_timestamp,
            received_topic,
            partition,
            offset,
            attempt,
            exception,
            payload,
        } = self;
        RecordEnvelope {
            record_id,
            key,
            original_topic,
            original_partition,
            original_offset,
            original_timestamp,
            received_topic,
            partition,
            offset,
            attempt,
            exception,
            payload: f(payload),
        }
    }

    /// Borrowing counterpart of [`map`](Self::map) that may fail.
    pub fn try_map_ref<Q, E>(
        &self,
        f: impl FnOnce(&P) -> Result<Q, E>,
    ) -> Result<RecordEnvelope<Q>, E> {
        let payload = f(&self.payload)?;
        Ok(RecordEnvelope {
            record_id: self.record_id,
            key: self.key.clone(),
            original_topic: self.original_topic.clone(),
            original_partition: self.original_partition,
            original_offset: self.original_offset,
            original_timestamp: self.original_timestamp,
            received_topic: self.received_topic.clone(),
            partition: self.partition,
            offset: self.offset,
            attempt: self.attempt,
            exception: self.exception.clone(),
            payload,
        })
    }

    /// Re-address for the next attempt on `next_topic`.
    pub(crate) fn into_retry(mut self, next_topic: String, failure: ExceptionContext) -> Self {
        self.attempt += 1;
        self.received_topic = next_topic;
        self.exception = Some(failure);
        self
    }

    /// Re-address for the terminal dead-letter topic. `attempt` is left as the last index tried.
    pub(crate) fn into_dead_letter(mut self, dlt_topic: String, failure: ExceptionContext) -> Self {
        self.received_topic = dlt_topic;
        self.exception = Some(failure);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delivery(topic: &str, offset: u64) -> Delivery<'_> {
        Delivery {
            topic,
            partition: 1,
            offset,
            timestamp: DateTime::<Utc>::from_timestamp_millis(1_700_000_000_000).unwrap(),
            key: Some("k"),
            attempt: 0,
        }
    }

    #[test]
    fn headerless_delivery_is_a_first_attempt() {
        let env =
            RecordEnvelope::from_delivery(delivery("orders", 7), &Headers::new(), "p").unwrap();

        assert_eq!(env.attempt(), 0);
        assert_eq!(env.original_topic(), "orders");
        assert_eq!(env.original_offset(), 7);
        assert_eq!(env.received_topic(), "orders");
        assert_eq!(env.key(), Some("k"));
        assert_eq!(env.record_id(), RecordId::from_position("orders", 1, 7));
        assert!(env.exception().is_none());
    }

    #[test]
    fn headerless_delivery_takes_attempt_from_its_topic() {
        let on_retry = Delivery {
            attempt: 2,
            ..delivery("orders-retry-1", 4)
        };
        let env = RecordEnvelope::from_delivery(on_retry, &Headers::new(), ()).unwrap();

        assert_eq!(env.attempt(), 2);
        assert_eq!(env.received_topic(), "orders-retry-1");
    }

    #[test]
    fn attempts_made_saturates_at_the_largest_attempt() {
        let wire = Headers::new().with(headers::ATTEMPT, u32::MAX);
        let env = RecordEnvelope::from_delivery(delivery("orders-dlt", 0), &wire, ()).unwrap();

        assert_eq!(env.attempt(), u32::MAX);
        assert_eq!(env.attempts_made(), u32::MAX);
    }

    #[test]
    fn headers_survive_republish() {
        let first =
            RecordEnvelope::from_delivery(delivery("orders", 3), &Headers::new(), ()).unwrap();
        let failure = ExceptionContext::new(FailureKind::Retryable, "boom", "orders");
        let retried = first.clone().into_retry("orders-retry-0".to_string(), failure.clone());

        let wire = retried.to_headers();
        assert_eq!(wire.get(headers::RECEIVED_TOPIC), Some("orders-retry-0"));
        assert_eq!(wire.get(headers::OFFSET), Some("3"));
        assert_eq!(wire.get(headers::ATTEMPT), Some("1"));
        assert_eq!(wire.get(headers::ORIGINAL_TIMESTAMP), Some("1700000000000"));

        let redelivered =
            RecordEnvelope::from_delivery(delivery("orders-retry-0", 0), &wire, ()).unwrap();
        assert_eq!(redelivered.record_id(), first.record_id());
        assert_eq!(redelivered.attempt(), 1);
        assert_eq!(redelivered.original_topic(), "orders");
        assert_eq!(redelivered.original_offset(), 3);
        assert_eq!(redelivered.original_timestamp(), first.original_timestamp());
        assert_eq!(redelivered.offset(), 0);
        assert_eq!(redelivered.exception(), Some(&failure));
    }

    #[test]
    fn malformed_attempt_header_is_rejected() {
        let wire = Headers::new().with(headers::ATTEMPT, "-1");
        let err = RecordEnvelope::from_delivery(delivery("orders", 0), &wire, ()).unwrap_err();
        assert_eq!(err, CoreError::invalid_header(headers::ATTEMPT, "-1"));
    }

    #[test]
    fn dead_letter_keeps_attempt_index() {
        let env = RecordEnvelope::new("orders", None, 1u8);
        let failure = ExceptionContext::new(FailureKind::Fatal, "bad", "orders");
        let dead = env.into_dead_letter("orders-dlt".to_string(), failure);

        assert_eq!(dead.attempt(), 0);
        assert_eq!(dead.attempts_made(), 1);
        assert_eq!(dead.received_topic(), "orders-dlt");
        assert_eq!(dead.exception().map(|e| e.kind), Some(FailureKind::Fatal));
    }
}
