//! Topic topology: one subject, its retry topics, and its dead-letter topic.
//!
//! Naming is derived from the subject alone:
//!
//! ```text
//! user-events            attempt 0
//! user-events-retry-0    attempt 1
//! user-events-retry-1    attempt 2
//! ...
//! user-events-retry-{M-2} attempt M-1
//! user-events-dlt        exhausted
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

const RETRY_INFIX: &str = "-retry-";
const DEAD_LETTER_SUFFIX: &str = "-dlt";

/// What a physical topic is for, relative to its subject.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicRole {
    /// The business topic; carries first attempts.
    Main,
    /// Retry topic with index `n`; carries attempt `n + 1`.
    Retry(u32),
    /// Terminal topic for exhausted records.
    DeadLetter,
}

impl TopicRole {
    /// Attempt number delivered on a topic with this role, if it has one.
    pub fn attempt(self) -> Option<u32> {
        match self {
            TopicRole::Main => Some(0),
            TopicRole::Retry(n) => Some(n + 1),
            TopicRole::DeadLetter => None,
        }
    }
}

/// The set of physical topics serving one subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicTopology {
    subject: String,
    max_attempts: u32,
}

impl TopicTopology {
    /// Build the topology for `subject` with `max_attempts` total attempts.
    ///
    /// `max_attempts <= 1` yields no retry topics.
    pub fn new(subject: impl Into<String>, max_attempts: u32) -> CoreResult<Self> {
        let subject = subject.into();
        if subject.trim().is_empty() {
            return Err(CoreError::invalid_topic("subject must not be empty"));
        }
        if subject.contains(RETRY_INFIX) || subject.ends_with(DEAD_LETTER_SUFFIX) {
            return Err(CoreError::invalid_topic(format!(
                "subject {subject:?} collides with retry/dead-letter naming"
            )));
        }
        Ok(Self {
            subject,
            max_attempts,
        })
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Number of retry topics (`max_attempts - 1`, or zero).
    pub fn retry_count(&self) -> u32 {
        self.max_attempts.saturating_sub(1)
    }

    /// Retry topic with index `n`, if it exists in this topology.
    pub fn retry_topic(&self, n: u32) -> Option<String> {
        (n < self.retry_count()).then(|| format!("{}{RETRY_INFIX}{n}", self.subject))
    }

    /// Topic on which attempt `attempt` is delivered.
    ///
    /// `None` for attempts beyond the last retry; those belong to the dead-letter topic.
    pub fn topic_for_attempt(&self, attempt: u32) -> Option<String> {
        match attempt {
            0 => Some(self.subject.clone()),
            a => self.retry_topic(a - 1),
        }
    }

    pub fn dead_letter_topic(&self) -> String {
        format!("{}{DEAD_LETTER_SUFFIX}", self.subject)
    }

    /// Retry topics in attempt order.
    pub fn retry_topics(&self) -> Vec<String> {
        (0..self.retry_count())
            .filter_map(|n| self.retry_topic(n))
            .collect()
    }

    /// Every topic the engine consumes from or publishes to, subject first, dead-letter last.
    pub fn all_topics(&self) -> Vec<String> {
        let mut topics = Vec::with_capacity(self.retry_count() as usize + 2);
        topics.push(self.subject.clone());
        topics.extend(self.retry_topics());
        topics.push(self.dead_letter_topic());
        topics
    }

    /// Classify a physical topic relative to this subject.
    pub fn role_of(&self, topic: &str) -> Option<TopicRole> {
        if topic == self.subject {
            return Some(TopicRole::Main);
        }
        let rest = topic.strip_prefix(self.subject.as_str())?;
        if rest == DEAD_LETTER_SUFFIX {
            return Some(TopicRole::DeadLetter);
        }
        let n: u32 = rest.strip_prefix(RETRY_INFIX)?.parse().ok()?;
        (n < self.retry_count()).then_some(TopicRole::Retry(n))
    }
}
