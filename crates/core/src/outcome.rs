//! Outcome classification for handler invocations.
//!
//! Handlers report failure through `anyhow::Error`. A [`FailureClassifier`] decides
//! whether that failure is worth another attempt. The default, [`RetryAll`], treats
//! every failure as retryable; deployments that can recognise permanent failures plug
//! in a [`PredicateClassifier`] instead.

use crate::envelope::FailureKind;

/// Result of one processing attempt, after classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    RetryableFailure(String),
    FatalFailure(String),
}

impl Outcome {
    /// Classify a handler result.
    pub fn classify<C>(result: &anyhow::Result<()>, classifier: &C) -> Self
    where
        C: FailureClassifier + ?Sized,
    {
        match result {
            Ok(()) => Outcome::Success,
            Err(err) => {
                // `{:#}` keeps the context chain on one line.
                let message = format!("{err:#}");
                match classifier.classify(err) {
                    FailureKind::Retryable => Outcome::RetryableFailure(message),
                    FailureKind::Fatal => Outcome::FatalFailure(message),
                }
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    /// Failure kind and message, if this outcome is a failure.
    pub fn failure(&self) -> Option<(FailureKind, &str)> {
        match self {
            Outcome::Success => None,
            Outcome::RetryableFailure(m) => Some((FailureKind::Retryable, m)),
            Outcome::FatalFailure(m) => Some((FailureKind::Fatal, m)),
        }
    }
}

/// Decides how a handler failure is routed.
pub trait FailureClassifier: Send + Sync {
    fn classify(&self, error: &anyhow::Error) -> FailureKind;
}

/// Every failure is retryable.
#[derive(Debug, Default, Copy, Clone)]
pub struct RetryAll;

impl FailureClassifier for RetryAll {
    fn classify(&self, _error: &anyhow::Error) -> FailureKind {
        FailureKind::Retryable
    }
}

/// Failures matching the predicate are fatal; everything else is retryable.
pub struct PredicateClassifier<F> {
    is_fatal: F,
}

impl<F> PredicateClassifier<F>
where
    F: Fn(&anyhow::Error) -> bool + Send + Sync,
{
    pub fn new(is_fatal: F) -> Self {
        Self { is_fatal }
    }
}

impl<F> FailureClassifier for PredicateClassifier<F>
where
    F: Fn(&anyhow::Error) -> bool + Send + Sync,
{
    fn classify(&self, error: &anyhow::Error) -> FailureKind {
        if (self.is_fatal)(error) {
            FailureKind::Fatal
        } else {
            FailureKind::Retryable
        }
    }
}

impl<F> core::fmt::Debug for PredicateClassifier<F> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PredicateClassifier").finish_non_exhaustive()
    }
}
