//! Retry policy: how many attempts, and how long to wait between them.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Default total attempts, including the first.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;

/// Default delay between attempts.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// Delay rule applied between a failed attempt and the next one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffSchedule {
    /// Same delay before every retry.
    Fixed(Duration),
    /// `initial * multiplier^k`, capped at `max`.
    Exponential {
        initial: Duration,
        multiplier: f64,
        max: Duration,
    },
    /// One delay per retry; the last entry is reused past the end.
    Explicit(Vec<Duration>),
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        Self::Fixed(DEFAULT_BACKOFF)
    }
}

impl BackoffSchedule {
    /// Delay to impose after attempt `k` (zero-based) failed.
    pub fn delay_after(&self, k: u32) -> Duration {
        match self {
            BackoffSchedule::Fixed(d) => *d,
            BackoffSchedule::Exponential {
                initial,
                multiplier,
                max,
            } => {
                let base_ms = initial.as_millis() as f64;
                let max_ms = max.as_millis() as f64;
                let exp = multiplier.powi(k.min(i32::MAX as u32) as i32);
                let delay_ms = (base_ms * exp).min(max_ms).max(0.0);
                Duration::from_millis(delay_ms as u64)
            }
            BackoffSchedule::Explicit(delays) => delays
                .get(k as usize)
                .or_else(|| delays.last())
                .copied()
                .unwrap_or(Duration::ZERO),
        }
    }

    /// Build an explicit schedule from millisecond values.
    ///
    /// A single value collapses to `Fixed`.
    pub fn from_millis(values: &[u64]) -> Self {
        match values {
            [single] => Self::Fixed(Duration::from_millis(*single)),
            many => Self::Explicit(many.iter().copied().map(Duration::from_millis).collect()),
        }
    }
}

/// Retry policy configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first (must be positive).
    pub max_attempts: u32,
    /// Delay rule between attempts.
    pub backoff: BackoffSchedule,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: BackoffSchedule::default(),
        }
    }
}

impl RetryPolicy {
    /// Dead-letter on the first failure.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Create a policy with fixed delays.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            backoff: BackoffSchedule::Fixed(delay),
        }
    }

    /// Create a policy with exponential backoff.
    pub fn exponential(max_attempts: u32, initial: Duration, max: Duration) -> Self {
        Self {
            max_attempts,
            backoff: BackoffSchedule::Exponential {
                initial,
                multiplier: 2.0,
                max,
            },
        }
    }

    /// Create a policy with one explicit delay per retry.
    pub fn explicit(max_attempts: u32, delays: Vec<Duration>) -> Self {
        Self {
            max_attempts,
            backoff: BackoffSchedule::Explicit(delays),
        }
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.max_attempts == 0 {
            return Err(CoreError::invalid_policy("max_attempts must be positive"));
        }
        match &self.backoff {
            BackoffSchedule::Explicit(delays) if delays.is_empty() && self.max_attempts > 1 => {
                Err(CoreError::invalid_policy(
                    "explicit backoff schedule must not be empty when retries are allowed",
                ))
            }
            BackoffSchedule::Exponential { multiplier, .. }
                if !multiplier.is_finite() || *multiplier < 1.0 =>
            {
                Err(CoreError::invalid_policy(format!(
                    "exponential multiplier must be >= 1.0 (got {multiplier})"
                )))
            }
            _ => Ok(()),
        }
    }

    /// Whether a failure of attempt `k` may be retried.
    pub fn should_retry(&self, k: u32) -> bool {
        k.saturating_add(1) < self.max_attempts
    }

    /// Delay before the retry that follows failed attempt `k`.
    pub fn delay_after(&self, k: u32) -> Duration {
        self.backoff.delay_after(k)
    }
}
