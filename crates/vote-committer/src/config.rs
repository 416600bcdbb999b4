//! Submission engine configuration.
//!
//! Only client-side knobs live here. The batch size ceiling and the price
//! precision belong to the voting contract and are read from it.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Retry, backoff and timeout settings for batch submission.
///
/// Durations are written in milliseconds:
///
/// ```json
/// { "max_retries": 3, "initial_backoff_ms": 500, "max_backoff_ms": 8000, "batch_timeout_ms": 60000 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SubmissionConfig {
    /// Extra attempts allowed for a batch after a transient failure
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further retry
    #[serde(rename = "initial_backoff_ms", with = "duration_ms")]
    pub initial_backoff: Duration,
    /// Upper bound on the delay between retries
    #[serde(rename = "max_backoff_ms", with = "duration_ms")]
    pub max_backoff: Duration,
    /// Time allowed for one submission attempt to finalize
    #[serde(rename = "batch_timeout_ms", with = "duration_ms")]
    pub batch_timeout: Duration,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            batch_timeout: Duration::from_secs(60),
        }
    }
}

impl SubmissionConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_timeout.is_zero() {
            return Err(ConfigError::Invalid("batch_timeout_ms must be positive".into()));
        }
        if self.initial_backoff > self.max_backoff {
            return Err(ConfigError::Invalid(
                "initial_backoff_ms must not exceed max_backoff_ms".into(),
            ));
        }
        Ok(())
    }

    /// Delay before retry number `retry` (0-based).
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = SubmissionConfig::from_json_str(r#"{ "max_retries": 5 }"#).unwrap();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.batch_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = SubmissionConfig::from_json_str(r#"{ "max_batch_size": 5 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = SubmissionConfig::from_json_str(r#"{ "batch_timeout_ms": 0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = SubmissionConfig::from_json_str(
            r#"{ "initial_backoff_ms": 10000, "max_backoff_ms": 100 }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let config = SubmissionConfig::default();
        assert_eq!(config.backoff_for(0), Duration::from_millis(500));
        assert_eq!(config.backoff_for(1), Duration::from_millis(1000));
        assert_eq!(config.backoff_for(3), Duration::from_millis(4000));
        assert_eq!(config.backoff_for(4), Duration::from_secs(8));
        assert_eq!(config.backoff_for(40), Duration::from_secs(8));
    }

    #[test]
    fn test_missing_file() {
        let err = SubmissionConfig::from_file("/nonexistent/committer.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
