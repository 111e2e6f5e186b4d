use std::sync::{Arc, Mutex};

/// Consumer runtime statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ConsumerStats {
    /// Deliveries handed to the record handler (all attempts).
    pub processed: u64,
    pub succeeded: u64,
    /// Failures re-published to a retry topic.
    pub retried: u64,
    /// Failures re-published to the dead-letter topic.
    pub dead_lettered: u64,
    /// Dead-letter deliveries passed to the dead-letter handler.
    pub dead_letters_handled: u64,
    /// Hand-off appends that failed and were retried.
    pub handoff_failures: u64,
}

/// Live view of a running consumer's statistics. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct SharedStats(Arc<Mutex<ConsumerStats>>);

impl SharedStats {
    pub(crate) fn update(&self, f: impl FnOnce(&mut ConsumerStats)) {
        if let Ok(mut stats) = self.0.lock() {
            f(&mut stats);
        }
    }

    pub fn snapshot(&self) -> ConsumerStats {
        self.0
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}
