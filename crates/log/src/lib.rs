//! Partitioned log abstraction, in-memory implementation and payload codecs.

pub mod codec;
pub mod in_memory;
pub mod log;
pub mod record;

pub use codec::{BytesCodec, CodecError, JsonCodec, PayloadCodec};
pub use in_memory::InMemoryLog;
pub use log::{LogError, LogResult, RecordLog};
pub use record::{LogRecord, ProducerRecord, RecordMetadata};
