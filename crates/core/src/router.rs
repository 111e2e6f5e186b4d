//! Failure routing (retry topic or dead-letter topic).
//!
//! The router is an explicit table indexed by the attempt that just failed:
//!
//! ```text
//! attempt k failed ──► table[k] ──► Retry { topic: retry-k, delay: backoff[k] }
//!                                └► DeadLetter { topic: {subject}-dlt }
//! ```
//!
//! The table is computed once from the [`RetryPolicy`] and the subject name, so every
//! routing decision is a lookup. Fatal failures bypass the table and go straight to
//! the dead-letter topic. Envelopes whose attempt lies beyond the table (for example
//! after `max_attempts` was lowered) are also dead-lettered.
//!
//! The router contains no IO; it only re-addresses envelopes.

use std::time::Duration;

use crate::envelope::{ExceptionContext, FailureKind, RecordEnvelope};
use crate::error::CoreResult;
use crate::policy::RetryPolicy;
use crate::topic::TopicTopology;

/// Destination for a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteTarget {
    Retry { topic: String, delay: Duration },
    DeadLetter { topic: String },
}

impl RouteTarget {
    pub fn topic(&self) -> &str {
        match self {
            RouteTarget::Retry { topic, .. } | RouteTarget::DeadLetter { topic } => topic,
        }
    }
}

/// A re-addressed envelope, ready to be handed to the scheduler or the dead-letter topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision<P> {
    Retry {
        envelope: RecordEnvelope<P>,
        delay: Duration,
    },
    DeadLetter {
        envelope: RecordEnvelope<P>,
    },
}

impl<P> RouteDecision<P> {
    pub fn envelope(&self) -> &RecordEnvelope<P> {
        match self {
            RouteDecision::Retry { envelope, .. } | RouteDecision::DeadLetter { envelope } => {
                envelope
            }
        }
    }

    pub fn is_dead_letter(&self) -> bool {
        matches!(self, RouteDecision::DeadLetter { .. })
    }
}

#[derive(Debug, Clone)]
pub struct Router {
    topology: TopicTopology,
    table: Vec<RouteTarget>,
    dead_letter: RouteTarget,
}

impl Router {
    pub fn new(subject: impl Into<String>, policy: &RetryPolicy) -> CoreResult<Self> {
        policy.validate()?;
        let topology = TopicTopology::new(subject, policy.max_attempts)?;
        let dead_letter = RouteTarget::DeadLetter {
            topic: topology.dead_letter_topic(),
        };

        let table = (0..policy.max_attempts)
            .map(|k| match topology.topic_for_attempt(k + 1) {
                Some(topic) if policy.should_retry(k) => RouteTarget::Retry {
                    topic,
                    delay: policy.delay_after(k),
                },
                _ => dead_letter.clone(),
            })
            .collect();

        Ok(Self {
            topology,
            table,
            dead_letter,
        })
    }

    pub fn topology(&self) -> &TopicTopology {
        &self.topology
    }

    /// The routing table, indexed by failed attempt.
    pub fn table(&self) -> &[RouteTarget] {
        &self.table
    }

    /// Destination for a failure of `kind` on attempt `attempt`.
    pub fn target_for(&self, attempt: u32, kind: FailureKind) -> &RouteTarget {
        match kind {
            FailureKind::Fatal => &self.dead_letter,
            FailureKind::Retryable => self
                .table
                .get(attempt as usize)
                .unwrap_or(&self.dead_letter),
        }
    }

    /// Re-address a failed envelope.
    pub fn route<P>(
        &self,
        envelope: RecordEnvelope<P>,
        kind: FailureKind,
        message: impl Into<String>,
    ) -> RouteDecision<P> {
        let failure = ExceptionContext::new(kind, message, envelope.received_topic());

        match self.target_for(envelope.attempt(), kind) {
            RouteTarget::Retry { topic, delay } => RouteDecision::Retry {
                envelope: envelope.into_retry(topic.clone(), failure),
                delay: *delay,
            },
            RouteTarget::DeadLetter { topic } => RouteDecision::DeadLetter {
                envelope: envelope.into_dead_letter(topic.clone(), failure),
            },
        }
    }
}
