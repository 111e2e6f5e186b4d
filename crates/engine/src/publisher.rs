//! Producer side: first publish of a business record.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use redelivery_core::{Headers, RecordId, headers};
use redelivery_log::{PayloadCodec, ProducerRecord, RecordLog, RecordMetadata};

use crate::error::{EngineError, EngineResult};

/// Publishes payloads to a subject, stamping first-attempt headers.
pub struct Publisher<P> {
    log: Arc<dyn RecordLog>,
    codec: Arc<dyn PayloadCodec<P>>,
}

impl<P> Clone for Publisher<P> {
    fn clone(&self) -> Self {
        Self {
            log: self.log.clone(),
            codec: self.codec.clone(),
        }
    }
}

impl<P> Publisher<P>
where
    P: Send + Sync + 'static,
{
    pub fn new<L, C>(log: Arc<L>, codec: C) -> Self
    where
        L: RecordLog + 'static,
        C: PayloadCodec<P> + 'static,
    {
        Self {
            log,
            codec: Arc::new(codec),
        }
    }

    /// Publish and wait for the append to complete.
    pub async fn publish(
        &self,
        subject: &str,
        key: Option<String>,
        payload: &P,
    ) -> EngineResult<RecordMetadata> {
        let record_id = RecordId::new();
        let bytes = self.codec.encode(payload).inspect_err(|err| {
            error!(topic = subject, %record_id, error = %err, "failed to encode payload");
        })?;

        let wire = Headers::new()
            .with(headers::RECORD_ID, record_id)
            .with(headers::RECEIVED_TOPIC, subject)
            .with(headers::ATTEMPT, 0)
            .with(headers::ORIGINAL_TIMESTAMP, Utc::now().timestamp_millis());

        let record = ProducerRecord::new(subject, bytes)
            .with_key(key)
            .with_headers(wire);

        match self.log.append(record).await {
            Ok(meta) => {
                info!(
                    topic = %meta.topic,
                    partition = meta.partition,
                    offset = meta.offset,
                    %record_id,
                    "record published"
                );
                Ok(meta)
            }
            Err(err) => {
                error!(topic = subject, %record_id, error = %err, "failed to publish record");
                Err(err.into())
            }
        }
    }

    /// Publish in the background.
    ///
    /// The outcome is logged either way; the returned handle can be awaited for it or
    /// dropped.
    pub fn send(
        &self,
        subject: impl Into<String>,
        key: Option<String>,
        payload: P,
    ) -> PublishHandle {
        let publisher = self.clone();
        let subject = subject.into();
        PublishHandle(tokio::spawn(async move {
            publisher.publish(&subject, key, &payload).await
        }))
    }
}

/// Completion of a background publish.
#[derive(Debug)]
pub struct PublishHandle(JoinHandle<EngineResult<RecordMetadata>>);

impl Future for PublishHandle {
    type Output = EngineResult<RecordMetadata>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.0).poll(cx).map(|joined| {
            joined
                .map_err(|e| EngineError::PublishTask(e.to_string()))
                .and_then(|published| published)
        })
    }
}
