use redelivery_core::CoreError;
use redelivery_log::{CodecError, LogError};

use crate::config::ConfigError;

pub type EngineResult<T> = Result<T, EngineError>;

/// Engine-level error.
///
/// Processing failures never show up here: the dispatch loop converts them into
/// routing decisions. These are wiring, configuration and transport failures.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Log(#[from] LogError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("no record handler registered")]
    MissingHandler,

    /// A background publish task was cancelled or panicked.
    #[error("publish task failed: {0}")]
    PublishTask(String),
}
