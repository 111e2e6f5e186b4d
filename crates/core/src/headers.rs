//! Wire headers carried by every delivery.
//!
//! Headers are plain string key/value pairs so any log backend can carry them.
//! The engine writes the full set on every re-publish; a record published by an
//! external producer may arrive with none of them, in which case the delivery
//! position itself supplies the defaults (see `RecordEnvelope::from_delivery`).

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

pub const RECORD_ID: &str = "record-id";
pub const RECEIVED_TOPIC: &str = "received-topic";
pub const OFFSET: &str = "offset";
pub const ATTEMPT: &str = "attempt";
pub const ORIGINAL_TIMESTAMP: &str = "original-timestamp";
pub const ORIGINAL_TOPIC: &str = "original-topic";
pub const ORIGINAL_PARTITION: &str = "original-partition";
pub const ORIGINAL_OFFSET: &str = "original-offset";
pub const BACKOFF_DUE_AT: &str = "backoff-due-at";
pub const EXCEPTION_KIND: &str = "exception-kind";
pub const EXCEPTION_MESSAGE: &str = "exception-message";
pub const EXCEPTION_TOPIC: &str = "exception-topic";

/// Ordered string header map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Headers(BTreeMap<String, String>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl ToString) {
        self.0.insert(name.into(), value.to_string());
    }

    pub fn with(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.0.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Parse an optional header; absent is `Ok(None)`, unparsable is an error.
    pub fn parse<T: FromStr>(&self, name: &'static str) -> CoreResult<Option<T>> {
        match self.get(name) {
            None => Ok(None),
            Some(raw) => raw
                .parse::<T>()
                .map(Some)
                .map_err(|_| CoreError::invalid_header(name, raw)),
        }
    }

    /// Parse a header that must be present.
    pub fn require<T: FromStr>(&self, name: &'static str) -> CoreResult<T> {
        self.parse(name)?.ok_or(CoreError::MissingHeader(name))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
