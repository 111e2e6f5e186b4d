//! Mapping between log records and envelopes.

use redelivery_core::{
    CoreError, CoreResult, Delivery, Headers, RecordEnvelope, TopicRole, headers,
};
use redelivery_log::{LogRecord, ProducerRecord};

/// A delivery read off a partition, payload still encoded.
#[derive(Debug)]
pub(crate) struct Inbound {
    pub(crate) envelope: RecordEnvelope<Vec<u8>>,
    /// Set when the wire headers could not be parsed or contradict the topic.
    /// `envelope` then carries only what the physical position and the topic role
    /// tell us.
    pub(crate) malformed: Option<CoreError>,
}

/// Rebuild the envelope of `record`, fetched from a topic with `role`.
///
/// An `attempt` header must match what the topic encodes: the attempt of a subject or
/// retry topic, or any attempt below `max_attempts` on the dead-letter topic. Anything
/// else is reported as malformed, with the attempt taken from the role instead.
pub(crate) fn read_envelope(
    record: &LogRecord,
    role: TopicRole,
    max_attempts: u32,
) -> CoreResult<Inbound> {
    let role_attempt = role.attempt().unwrap_or(max_attempts.saturating_sub(1));
    let delivery = Delivery {
        attempt: role_attempt,
        ..record.delivery()
    };

    let parsed = RecordEnvelope::from_delivery(
        delivery.clone(),
        &record.headers,
        record.payload.clone(),
    )
    .and_then(|envelope| {
        let consistent = match role.attempt() {
            Some(expected) => envelope.attempt() == expected,
            None => envelope.attempt() < max_attempts,
        };
        if consistent {
            Ok(envelope)
        } else {
            Err(CoreError::invalid_header(
                headers::ATTEMPT,
                envelope.attempt().to_string(),
            ))
        }
    });

    match parsed {
        Ok(envelope) => Ok(Inbound {
            envelope,
            malformed: None,
        }),
        Err(err) => {
            let envelope =
                RecordEnvelope::from_delivery(delivery, &Headers::new(), record.payload.clone())?;
            Ok(Inbound {
                envelope,
                malformed: Some(err),
            })
        }
    }
}

/// Producer record re-publishing `envelope` to its `received_topic`.
///
/// The source partition is kept (modulo the target's partition count) so records
/// from one partition stay together on the next topic.
pub(crate) fn to_producer_record(
    envelope: &RecordEnvelope<Vec<u8>>,
    partitions: u32,
) -> ProducerRecord {
    ProducerRecord::new(envelope.received_topic(), envelope.payload().clone())
        .with_key(envelope.key().map(str::to_string))
        .with_partition(envelope.partition() % partitions.max(1))
        .with_headers(envelope.to_headers())
}
