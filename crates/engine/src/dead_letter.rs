//! Dead-letter topic consumer.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, warn};

use redelivery_core::TopicRole;
use redelivery_log::{LogRecord, PayloadCodec};

use crate::dispatch::PartitionProcessor;
use crate::handler::{DeadLetterHandler, invoke_guarded};
use crate::shutdown::ShutdownSignal;
use crate::stats::SharedStats;
use crate::wire;

/// Terminal processor: hands every dead letter to the handler once and commits,
/// whatever the handler says. Nothing is ever re-published from here.
pub(crate) struct DeadLetterProcessor<P> {
    pub(crate) handler: Arc<dyn DeadLetterHandler<P>>,
    pub(crate) codec: Arc<dyn PayloadCodec<P>>,
    pub(crate) stats: SharedStats,
    pub(crate) max_attempts: u32,
}

#[async_trait]
impl<P> PartitionProcessor for DeadLetterProcessor<P>
where
    P: Send + Sync + 'static,
{
    async fn process(&self, record: &LogRecord, _shutdown: &mut ShutdownSignal) -> bool {
        let inbound = match wire::read_envelope(record, TopicRole::DeadLetter, self.max_attempts) {
            Ok(inbound) => inbound,
            Err(err) => {
                error!(
                    topic = %record.topic,
                    partition = record.partition,
                    offset = record.offset,
                    error = %err,
                    "unreadable dead letter skipped"
                );
                return true;
            }
        };
        let envelope = &inbound.envelope;
        let exception = envelope.exception();

        if let Some(err) = &inbound.malformed {
            warn!(
                record_id = %envelope.record_id(),
                error = %err,
                "dead letter has malformed headers"
            );
        }

        warn!(
            record_id = %envelope.record_id(),
            key = envelope.key().unwrap_or_default(),
            topic = envelope.received_topic(),
            partition = envelope.partition(),
            offset = envelope.offset(),
            original_topic = envelope.original_topic(),
            original_offset = envelope.original_offset(),
            attempts = envelope.attempts_made(),
            exception_kind = exception.map(|e| e.kind.as_str()).unwrap_or_default(),
            exception_topic = exception.map(|e| e.topic.as_str()).unwrap_or_default(),
            exception = exception.map(|e| e.message.as_str()).unwrap_or_default(),
            "dead letter received"
        );

        let handled = match envelope.try_map_ref(|bytes| self.codec.decode(bytes)) {
            Ok(typed) => invoke_guarded(|| self.handler.handle_dead_letter(&typed)),
            Err(err) => {
                warn!(
                    record_id = %envelope.record_id(),
                    error = %err,
                    "dead letter payload could not be decoded; handing over raw bytes"
                );
                invoke_guarded(|| self.handler.handle_undecodable(envelope, &err))
            }
        };

        if let Err(err) = handled {
            error!(
                record_id = %envelope.record_id(),
                error = %format!("{err:#}"),
                "dead-letter handler failed"
            );
        }
        self.stats.update(|s| s.dead_letters_handled += 1);
        true
    }
}
