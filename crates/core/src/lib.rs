//! `redelivery-core`: retry/dead-letter routing model.
//!
//! This crate contains **pure** building blocks (no IO, no async): the record envelope
//! and its wire headers, the topic topology, the retry policy, outcome classification
//! and the table-driven router.

pub mod envelope;
pub mod error;
pub mod headers;
pub mod id;
pub mod outcome;
pub mod policy;
pub mod router;
pub mod topic;

pub use envelope::{Delivery, ExceptionContext, FailureKind, RecordEnvelope};
pub use error::{CoreError, CoreResult};
pub use headers::Headers;
pub use id::RecordId;
pub use outcome::{FailureClassifier, Outcome, PredicateClassifier, RetryAll};
pub use policy::{BackoffSchedule, RetryPolicy};
pub use router::{RouteDecision, RouteTarget, Router};
pub use topic::{TopicRole, TopicTopology};
