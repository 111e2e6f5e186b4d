//! Payload serialization (pluggable).
//!
//! The log stores opaque bytes; a [`PayloadCodec`] turns them into the handler's
//! payload type and back. [`JsonCodec`] covers any serde type.

use serde::Serialize;
use serde::de::DeserializeOwned;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("failed to encode payload: {0}")]
    Encode(String),

    #[error("failed to decode payload: {0}")]
    Decode(String),
}

pub trait PayloadCodec<P>: Send + Sync {
    fn encode(&self, payload: &P) -> Result<Vec<u8>, CodecError>;

    fn decode(&self, bytes: &[u8]) -> Result<P, CodecError>;
}

/// JSON via `serde_json`.
#[derive(Debug, Default, Copy, Clone)]
pub struct JsonCodec;

impl<P> PayloadCodec<P> for JsonCodec
where
    P: Serialize + DeserializeOwned,
{
    fn encode(&self, payload: &P) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(payload).map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<P, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }
}

/// Pass-through for raw byte payloads.
#[derive(Debug, Default, Copy, Clone)]
pub struct BytesCodec;

impl PayloadCodec<Vec<u8>> for BytesCodec {
    fn encode(&self, payload: &Vec<u8>) -> Result<Vec<u8>, CodecError> {
        Ok(payload.clone())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(bytes.to_vec())
    }
}
