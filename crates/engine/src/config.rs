//! Consumer configuration.
//!
//! Values come from the environment (`REDELIVERY_*`), falling back to defaults that
//! match a local single-broker setup.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use redelivery_core::{BackoffSchedule, CoreError, RetryPolicy};

pub const ENV_SUBJECT: &str = "REDELIVERY_SUBJECT";
pub const ENV_GROUP_ID: &str = "REDELIVERY_GROUP_ID";
pub const ENV_BOOTSTRAP: &str = "REDELIVERY_BOOTSTRAP";
pub const ENV_MAX_ATTEMPTS: &str = "REDELIVERY_MAX_ATTEMPTS";
pub const ENV_BACKOFF_MS: &str = "REDELIVERY_BACKOFF_MS";
pub const ENV_PARTITIONS: &str = "REDELIVERY_PARTITIONS";
pub const ENV_POLL_INTERVAL_MS: &str = "REDELIVERY_POLL_INTERVAL_MS";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error(transparent)]
    Policy(#[from] CoreError),
}

impl ConfigError {
    fn invalid(key: &'static str, value: impl Into<String>, reason: impl ToString) -> Self {
        Self::Invalid {
            key,
            value: value.into(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumerConfig {
    /// Logical business topic.
    pub subject: String,
    /// Consumer cohort; committed offsets are tracked per group.
    pub group_id: String,
    /// Broker connection string. Opaque to the engine; logged at startup.
    pub bootstrap: String,
    #[serde(default)]
    pub policy: RetryPolicy,
    /// Partition count used when provisioning missing topics.
    pub partitions: u32,
    /// Idle wait between empty fetches, and between hand-off retries.
    pub poll_interval: Duration,
    /// Maximum records per fetch.
    pub fetch_max: usize,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            subject: "user-events".to_string(),
            group_id: "redelivery-group".to_string(),
            bootstrap: "localhost:9092".to_string(),
            policy: RetryPolicy::default(),
            partitions: 3,
            poll_interval: Duration::from_millis(100),
            fetch_max: 64,
        }
    }
}

impl ConsumerConfig {
    pub fn new(subject: impl Into<String>, group_id: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            group_id: group_id.into(),
            ..Default::default()
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_partitions(mut self, partitions: u32) -> Self {
        self.partitions = partitions;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: impl Into<String>) -> Self {
        self.bootstrap = bootstrap.into();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.group_id.trim().is_empty() {
            return Err(ConfigError::invalid(ENV_GROUP_ID, &self.group_id, "must not be empty"));
        }
        if self.partitions == 0 {
            return Err(ConfigError::invalid(ENV_PARTITIONS, "0", "must be positive"));
        }
        if self.fetch_max == 0 {
            return Err(ConfigError::invalid("fetch_max", "0", "must be positive"));
        }
        self.policy.validate()?;
        Ok(())
    }

    /// Load from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (used by `from_env` and tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let subject = lookup(ENV_SUBJECT).unwrap_or(defaults.subject);
        let group_id = lookup(ENV_GROUP_ID).unwrap_or_else(|| {
            warn!(
                default = %defaults.group_id,
                "{ENV_GROUP_ID} not set; using default consumer group"
            );
            defaults.group_id.clone()
        });
        let bootstrap = lookup(ENV_BOOTSTRAP).unwrap_or(defaults.bootstrap);

        let max_attempts = match lookup(ENV_MAX_ATTEMPTS) {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .map_err(|e| ConfigError::invalid(ENV_MAX_ATTEMPTS, &raw, e))?,
            None => defaults.policy.max_attempts,
        };

        let backoff = match lookup(ENV_BACKOFF_MS) {
            Some(raw) => BackoffSchedule::from_millis(&parse_millis_list(ENV_BACKOFF_MS, &raw)?),
            None => defaults.policy.backoff,
        };

        let partitions = match lookup(ENV_PARTITIONS) {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .map_err(|e| ConfigError::invalid(ENV_PARTITIONS, &raw, e))?,
            None => defaults.partitions,
        };

        let poll_interval = match lookup(ENV_POLL_INTERVAL_MS) {
            Some(raw) => Duration::from_millis(
                raw.trim()
                    .parse::<u64>()
                    .map_err(|e| ConfigError::invalid(ENV_POLL_INTERVAL_MS, &raw, e))?,
            ),
            None => defaults.poll_interval,
        };

        let config = Self {
            subject,
            group_id,
            bootstrap,
            policy: RetryPolicy {
                max_attempts,
                backoff,
            },
            partitions,
            poll_interval,
            fetch_max: defaults.fetch_max,
        };
        config.validate()?;
        Ok(config)
    }
}

fn parse_millis_list(key: &'static str, raw: &str) -> Result<Vec<u64>, ConfigError> {
    let values = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<u64>().map_err(|e| ConfigError::invalid(key, raw, e)))
        .collect::<Result<Vec<_>, _>>()?;

    if values.is_empty() {
        return Err(ConfigError::invalid(key, raw, "expected at least one delay"));
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = ConsumerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ConsumerConfig::default());
        assert_eq!(config.policy.max_attempts, 4);
    }

    #[test]
    fn reads_attempts_and_backoff_list() {
        let config = ConsumerConfig::from_lookup(lookup(&[
            (ENV_SUBJECT, "payments"),
            (ENV_MAX_ATTEMPTS, "3"),
            (ENV_BACKOFF_MS, "100, 500"),
        ]))
        .unwrap();

        assert_eq!(config.subject, "payments");
        assert_eq!(config.policy.max_attempts, 3);
        assert_eq!(
            config.policy.backoff,
            BackoffSchedule::Explicit(vec![Duration::from_millis(100), Duration::from_millis(500)])
        );
    }

    #[test]
    fn single_backoff_value_is_fixed() {
        let config = ConsumerConfig::from_lookup(lookup(&[(ENV_BACKOFF_MS, "250")])).unwrap();
        assert_eq!(
            config.policy.backoff,
            BackoffSchedule::Fixed(Duration::from_millis(250))
        );
    }

    #[test]
    fn rejects_zero_attempts() {
        let err = ConsumerConfig::from_lookup(lookup(&[(ENV_MAX_ATTEMPTS, "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Policy(CoreError::InvalidPolicy(_))));
    }

    #[test]
    fn rejects_unparsable_values() {
        assert!(matches!(
            ConsumerConfig::from_lookup(lookup(&[(ENV_MAX_ATTEMPTS, "four")])),
            Err(ConfigError::Invalid { key: ENV_MAX_ATTEMPTS, .. })
        ));
        assert!(matches!(
            ConsumerConfig::from_lookup(lookup(&[(ENV_BACKOFF_MS, " , ")])),
            Err(ConfigError::Invalid { key: ENV_BACKOFF_MS, .. })
        ));
        assert!(matches!(
            ConsumerConfig::from_lookup(lookup(&[(ENV_PARTITIONS, "0")])),
            Err(ConfigError::Invalid { key: ENV_PARTITIONS, .. })
        ));
    }
}
