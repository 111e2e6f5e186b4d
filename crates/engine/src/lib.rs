//! `redelivery-engine`: async runtime around the routing model.
//!
//! - [`RetryingConsumer`]: partition workers for the subject, its retry topics and its
//!   dead-letter topic
//! - [`Publisher`]: first publish of business records
//! - [`BackoffScheduler`]: delayed redelivery through due-stamped retry records
//! - [`ConsumerConfig`]: env-driven configuration

pub mod config;
pub mod consumer;
mod dead_letter;
mod dispatch;
pub mod error;
pub mod handler;
pub mod publisher;
pub mod scheduler;
pub mod shutdown;
pub mod stats;
mod wire;

pub use config::{ConfigError, ConsumerConfig};
pub use consumer::{ConsumerHandle, RetryingConsumer};
pub use error::{EngineError, EngineResult};
pub use handler::{DeadLetterHandler, Deduplicate, LogDeadLetters, RecordHandler};
pub use publisher::{PublishHandle, Publisher};
pub use scheduler::BackoffScheduler;
pub use shutdown::ShutdownSignal;
pub use stats::{ConsumerStats, SharedStats};
