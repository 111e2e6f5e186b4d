//! Backoff scheduling.
//!
//! A failed record is appended to its retry topic right away, stamped with a
//! `backoff-due-at` header. The retry topic's own partition workers hold each record
//! until it is due. The worker that saw the failure never waits, and the delay
//! survives restarts because it lives in the record.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use redelivery_core::headers;
use redelivery_log::{LogRecord, LogResult, ProducerRecord, RecordLog, RecordMetadata};

use crate::shutdown::ShutdownSignal;

#[derive(Clone)]
pub struct BackoffScheduler {
    log: Arc<dyn RecordLog>,
}

impl BackoffScheduler {
    pub fn new(log: Arc<dyn RecordLog>) -> Self {
        Self { log }
    }

    /// Durably append `record`, visible for processing no earlier than `delay` from now.
    pub async fn schedule(
        &self,
        mut record: ProducerRecord,
        delay: Duration,
    ) -> LogResult<RecordMetadata> {
        let due_ms = due_at_millis(Utc::now(), delay);
        record.headers.insert(headers::BACKOFF_DUE_AT, due_ms);
        debug!(
            topic = %record.topic,
            due_ms,
            delay_ms = delay.as_millis() as u64,
            "scheduling retry"
        );
        self.log.append(record).await
    }

    /// When `record` becomes due, if it carries a readable due time.
    pub fn due_at(record: &LogRecord) -> Option<DateTime<Utc>> {
        let ms = record
            .headers
            .parse::<i64>(headers::BACKOFF_DUE_AT)
            .ok()
            .flatten()?;
        DateTime::<Utc>::from_timestamp_millis(ms)
    }

    /// Wait until `record` is due.
    ///
    /// Returns `false` if shutdown was requested first; the record must then be left
    /// uncommitted.
    pub async fn hold_until_due(record: &LogRecord, shutdown: &mut ShutdownSignal) -> bool {
        let Some(due) = Self::due_at(record) else {
            return !shutdown.is_triggered();
        };
        match (due - Utc::now()).to_std() {
            Ok(wait) if !wait.is_zero() => {
                debug!(
                    topic = %record.topic,
                    partition = record.partition,
                    offset = record.offset,
                    wait_ms = wait.as_millis() as u64,
                    "holding record until due"
                );
                shutdown.sleep(wait).await
            }
            _ => !shutdown.is_triggered(),
        }
    }
}

/// `now + delay` in epoch milliseconds, rounded up so the record is never early.
fn due_at_millis(now: DateTime<Utc>, delay: Duration) -> i64 {
    let due_micros = now
        .timestamp_micros()
        .saturating_add(i64::try_from(delay.as_micros()).unwrap_or(i64::MAX));
    due_micros.saturating_add(999).div_euclid(1000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use redelivery_log::InMemoryLog;

    #[test]
    fn due_time_rounds_up_to_the_next_millisecond() {
        let now = DateTime::<Utc>::from_timestamp_micros(1_700_000_000_000_500).unwrap();
        assert_eq!(due_at_millis(now, Duration::from_millis(10)), 1_700_000_000_011);

        let exact = DateTime::<Utc>::from_timestamp_millis(1_700_000_000_000).unwrap();
        assert_eq!(due_at_millis(exact, Duration::ZERO), 1_700_000_000_000);
    }

    #[tokio::test]
    async fn scheduled_records_carry_their_due_time() {
        let log = Arc::new(InMemoryLog::new());
        let scheduler = BackoffScheduler::new(log.clone());

        let before = Utc::now();
        scheduler
            .schedule(
                ProducerRecord::new("orders-retry-0", b"x".to_vec()),
                Duration::from_millis(50),
            )
            .await
            .unwrap();

        let stored = log.records("orders-retry-0");
        let due = BackoffScheduler::due_at(&stored[0]).unwrap();
        assert!(due >= before + chrono::Duration::milliseconds(50));
    }

    #[tokio::test]
    async fn hold_waits_for_the_due_time() {
        let log = Arc::new(InMemoryLog::new());
        let scheduler = BackoffScheduler::new(log.clone());
        scheduler
            .schedule(
                ProducerRecord::new("orders-retry-0", b"x".to_vec()),
                Duration::from_millis(30),
            )
            .await
            .unwrap();
        let stored = log.records("orders-retry-0").remove(0);

        let mut signal = ShutdownSignal::never();
        assert!(BackoffScheduler::hold_until_due(&stored, &mut signal).await);
        assert!(Utc::now() >= BackoffScheduler::due_at(&stored).unwrap());
    }

    #[tokio::test]
    async fn records_without_due_time_pass_straight_through() {
        let record = LogRecord {
            topic: "orders-retry-0".into(),
            partition: 0,
            offset: 0,
            timestamp: Utc::now(),
            key: None,
            headers: Default::default(),
            payload: Vec::new(),
        };
        let mut signal = ShutdownSignal::never();
        assert!(BackoffScheduler::hold_until_due(&record, &mut signal).await);
    }
}
