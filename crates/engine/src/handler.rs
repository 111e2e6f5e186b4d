//! Handler seams.
//!
//! A [`RecordHandler`] processes one delivery and reports failure through
//! `anyhow::Error`. A [`DeadLetterHandler`] observes records that exhausted their
//! attempts. Both are synchronous; the engine calls them from the partition worker.

use std::any::Any;
use std::collections::{HashSet, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Mutex;

use tracing::{debug, warn};

use redelivery_core::{RecordEnvelope, RecordId};
use redelivery_log::CodecError;

/// Business processing for one delivery.
pub trait RecordHandler<P>: Send + Sync {
    fn handle(&self, record: &RecordEnvelope<P>) -> anyhow::Result<()>;
}

impl<P, F> RecordHandler<P> for F
where
    F: Fn(&RecordEnvelope<P>) -> anyhow::Result<()> + Send + Sync,
{
    fn handle(&self, record: &RecordEnvelope<P>) -> anyhow::Result<()> {
        self(record)
    }
}

/// Terminal processing for dead-lettered records.
///
/// Errors are logged and the record is committed regardless.
pub trait DeadLetterHandler<P>: Send + Sync {
    fn handle_dead_letter(&self, record: &RecordEnvelope<P>) -> anyhow::Result<()>;

    /// Called instead of [`handle_dead_letter`](Self::handle_dead_letter) when the
    /// payload cannot be decoded; `record` carries the raw bytes.
    fn handle_undecodable(
        &self,
        record: &RecordEnvelope<Vec<u8>>,
        error: &CodecError,
    ) -> anyhow::Result<()> {
        warn!(
            record_id = %record.record_id(),
            original_topic = record.original_topic(),
            original_offset = record.original_offset(),
            bytes = record.payload().len(),
            error = %error,
            "undecodable dead letter left unhandled"
        );
        Ok(())
    }
}

impl<P, F> DeadLetterHandler<P> for F
where
    F: Fn(&RecordEnvelope<P>) -> anyhow::Result<()> + Send + Sync,
{
    fn handle_dead_letter(&self, record: &RecordEnvelope<P>) -> anyhow::Result<()> {
        self(record)
    }
}

/// Dead-letter handler used when none is registered: logs and moves on.
#[derive(Debug, Default, Copy, Clone)]
pub struct LogDeadLetters;

impl<P> DeadLetterHandler<P> for LogDeadLetters {
    fn handle_dead_letter(&self, record: &RecordEnvelope<P>) -> anyhow::Result<()> {
        warn!(
            record_id = %record.record_id(),
            original_topic = record.original_topic(),
            original_offset = record.original_offset(),
            attempts = record.attempts_made(),
            "dead letter left unhandled"
        );
        Ok(())
    }
}

/// Makes a dead-letter handler idempotent per record id.
///
/// Redelivery of a dead-lettered record (for example after a crash before commit)
/// runs the inner handler's side effects at most once per successful handling.
/// Failed handlings are not remembered, so a later redelivery tries again.
///
/// Only the most recent `capacity` ids are remembered; a redelivery older than that
/// reaches the inner handler again.
pub struct Deduplicate<H> {
    inner: H,
    seen: Mutex<RecentIds>,
}

impl<H> Deduplicate<H> {
    pub const DEFAULT_CAPACITY: usize = 10_000;

    pub fn new(inner: H) -> Self {
        Self::with_capacity(inner, Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(inner: H, capacity: usize) -> Self {
        Self {
            inner,
            seen: Mutex::new(RecentIds::new(capacity)),
        }
    }

    pub fn inner(&self) -> &H {
        &self.inner
    }

    fn once(
        &self,
        id: RecordId,
        handle: impl FnOnce() -> anyhow::Result<()>,
    ) -> anyhow::Result<()> {
        let already_handled = self.seen.lock().map(|s| s.contains(&id)).unwrap_or(false);
        if already_handled {
            debug!(record_id = %id, "duplicate dead letter skipped");
            return Ok(());
        }

        handle()?;

        if let Ok(mut seen) = self.seen.lock() {
            seen.insert(id);
        }
        Ok(())
    }
}

impl<P, H> DeadLetterHandler<P> for Deduplicate<H>
where
    H: DeadLetterHandler<P>,
{
    fn handle_dead_letter(&self, record: &RecordEnvelope<P>) -> anyhow::Result<()> {
        self.once(record.record_id(), || self.inner.handle_dead_letter(record))
    }

    fn handle_undecodable(
        &self,
        record: &RecordEnvelope<Vec<u8>>,
        error: &CodecError,
    ) -> anyhow::Result<()> {
        self.once(record.record_id(), || {
            DeadLetterHandler::<P>::handle_undecodable(&self.inner, record, error)
        })
    }
}

/// Insertion-ordered set that evicts its oldest id past `capacity`.
struct RecentIds {
    ids: HashSet<RecordId>,
    order: VecDeque<RecordId>,
    capacity: usize,
}

impl RecentIds {
    fn new(capacity: usize) -> Self {
        Self {
            ids: HashSet::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    fn contains(&self, id: &RecordId) -> bool {
        self.ids.contains(id)
    }

    fn insert(&mut self, id: RecordId) {
        if !self.ids.insert(id) {
            return;
        }
        self.order.push_back(id);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
    }
}

/// Run a handler call, turning a panic into an ordinary failure.
pub(crate) fn invoke_guarded(call: impl FnOnce() -> anyhow::Result<()>) -> anyhow::Result<()> {
    panic::catch_unwind(AssertUnwindSafe(call)).unwrap_or_else(|payload| {
        Err(anyhow::anyhow!(
            "handler panicked: {}",
            panic_message(&*payload)
        ))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Counting(AtomicU32);

    impl DeadLetterHandler<String> for Counting {
        fn handle_dead_letter(&self, _record: &RecordEnvelope<String>) -> anyhow::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn closures_are_record_handlers() {
        let handler = |r: &RecordEnvelope<String>| -> anyhow::Result<()> {
            anyhow::ensure!(r.payload() != "bad", "rejected");
            Ok(())
        };

        let good = RecordEnvelope::new("orders", None, "ok".to_string());
        let bad = RecordEnvelope::new("orders", None, "bad".to_string());
        assert!(RecordHandler::handle(&handler, &good).is_ok());
        assert!(RecordHandler::handle(&handler, &bad).is_err());
    }

    #[test]
    fn panics_become_failures() {
        let err = invoke_guarded(|| panic!("kaboom")).unwrap_err();
        assert_eq!(err.to_string(), "handler panicked: kaboom");
        assert!(invoke_guarded(|| Ok(())).is_ok());
    }

    #[test]
    fn deduplicate_runs_inner_once_per_record() {
        let handler = Deduplicate::new(Counting(AtomicU32::new(0)));
        let record = RecordEnvelope::new("orders", None, "x".to_string());
        let other = RecordEnvelope::new("orders", None, "y".to_string());

        handler.handle_dead_letter(&record).unwrap();
        handler.handle_dead_letter(&record).unwrap();
        handler.handle_dead_letter(&other).unwrap();

        assert_eq!(handler.inner().0.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn deduplicate_forgets_failed_handlings() {
        let calls = AtomicU32::new(0);
        let flaky = |_: &RecordEnvelope<String>| -> anyhow::Result<()> {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                anyhow::bail!("first call fails");
            }
            Ok(())
        };
        let handler = Deduplicate::new(flaky);
        let record = RecordEnvelope::new("orders", None, "x".to_string());

        assert!(handler.handle_dead_letter(&record).is_err());
        assert!(handler.handle_dead_letter(&record).is_ok());
        assert!(handler.handle_dead_letter(&record).is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn deduplicate_forgets_ids_beyond_capacity() {
        let handler = Deduplicate::with_capacity(Counting(AtomicU32::new(0)), 2);
        let records: Vec<_> = ["a", "b", "c"]
            .into_iter()
            .map(|p| RecordEnvelope::new("orders", None, p.to_string()))
            .collect();

        for record in &records {
            handler.handle_dead_letter(record).unwrap();
        }
        // "a" was evicted by "c"; "c" is still remembered.
        handler.handle_dead_letter(&records[0]).unwrap();
        handler.handle_dead_letter(&records[2]).unwrap();

        assert_eq!(handler.inner().0.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn deduplicate_covers_undecodable_dead_letters() {
        struct Raw(AtomicU32);

        impl DeadLetterHandler<String> for Raw {
            fn handle_dead_letter(&self, _: &RecordEnvelope<String>) -> anyhow::Result<()> {
                Ok(())
            }

            fn handle_undecodable(
                &self,
                _: &RecordEnvelope<Vec<u8>>,
                _: &CodecError,
            ) -> anyhow::Result<()> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }

        let handler = Deduplicate::new(Raw(AtomicU32::new(0)));
        let record = RecordEnvelope::new("orders", None, b"not json".to_vec());
        let error = CodecError::Decode("expected value".into());

        DeadLetterHandler::<String>::handle_undecodable(&handler, &record, &error).unwrap();
        DeadLetterHandler::<String>::handle_undecodable(&handler, &record, &error).unwrap();

        assert_eq!(handler.inner().0.load(Ordering::SeqCst), 1);
    }
}
