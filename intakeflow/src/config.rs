//! Configuration for the intake pipeline.
//!
//! Every field has a serde default, so a partial JSON document is enough to
//! override just the values that differ from the defaults.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::IntakeflowError;
use crate::resilience::{BreakerConfig, RetryPolicy};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntakeConfig {
    /// Idempotency gate settings.
    #[serde(default)]
    pub idempotency: IdempotencyConfig,
    /// Circuit breaker guarding the risk API.
    #[serde(default)]
    pub breaker: BreakerConfig,
    /// Retry policy for risk API calls.
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Batch worker pool.
    #[serde(default)]
    pub batch: BatchConfig,
    /// Validation rules.
    #[serde(default)]
    pub validation: ValidationConfig,
}

impl IntakeConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a (possibly partial) JSON document and validates it.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or a value is out of range.
    pub fn from_json_str(json: &str) -> Result<Self, IntakeflowError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`IntakeflowError::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<(), IntakeflowError> {
        if self.breaker.failure_threshold == 0 {
            return Err(IntakeflowError::config(
                "breaker.failure_threshold must be at least 1",
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(IntakeflowError::config(
                "retry.max_attempts must be at least 1",
            ));
        }
        if !self.retry.multiplier.is_finite() || self.retry.multiplier < 1.0 {
            return Err(IntakeflowError::config(
                "retry.multiplier must be a finite number >= 1",
            ));
        }
        if self.retry.max_delay_ms < self.retry.base_delay_ms {
            return Err(IntakeflowError::config(
                "retry.max_delay_ms must not be below retry.base_delay_ms",
            ));
        }
        if self.batch.max_workers == 0 {
            return Err(IntakeflowError::config(
                "batch.max_workers must be at least 1",
            ));
        }
        Ok(())
    }

    /// Sets the idempotency settings.
    #[must_use]
    pub fn with_idempotency(mut self, idempotency: IdempotencyConfig) -> Self {
        self.idempotency = idempotency;
        self
    }

    /// Sets the breaker settings.
    #[must_use]
    pub fn with_breaker(mut self, breaker: BreakerConfig) -> Self {
        self.breaker = breaker;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the batch pool size.
    #[must_use]
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.batch.max_workers = max_workers;
        self
    }
}

/// Idempotency gate settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdempotencyConfig {
    /// How long a caller may wait for a per-key lock. `None` waits forever.
    #[serde(default)]
    pub lock_wait_timeout_ms: Option<u64>,
    /// Top-level payload fields ignored when deriving the key.
    #[serde(default = "default_excluded_fields")]
    pub excluded_fields: Vec<String>,
}

fn default_excluded_fields() -> Vec<String> {
    ["received_at", "correlation_id", "retry_count", "source_ip"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            lock_wait_timeout_ms: None,
            excluded_fields: default_excluded_fields(),
        }
    }
}

impl IdempotencyConfig {
    /// Sets the lock wait timeout.
    #[must_use]
    pub fn with_lock_wait_timeout(mut self, timeout: Duration) -> Self {
        self.lock_wait_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Replaces the excluded field list.
    #[must_use]
    pub fn with_excluded_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Gets the lock wait timeout as a Duration.
    #[must_use]
    pub fn lock_wait_timeout(&self) -> Option<Duration> {
        self.lock_wait_timeout_ms.map(Duration::from_millis)
    }
}

/// Batch worker pool settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Maximum items in flight at once.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
}

fn default_max_workers() -> usize {
    5
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
        }
    }
}

/// Validation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Fields that must be present and non-empty.
    #[serde(default = "default_required_fields")]
    pub required_fields: Vec<String>,
}

fn default_required_fields() -> Vec<String> {
    ["company_id", "company_name", "revenue", "industry", "state"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            required_fields: default_required_fields(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = IntakeConfig::default();
        assert_eq!(config.idempotency.lock_wait_timeout(), None);
        assert_eq!(
            config.idempotency.excluded_fields,
            vec!["received_at", "correlation_id", "retry_count", "source_ip"]
        );
        assert_eq!(config.breaker.failure_threshold, 5);
        assert_eq!(config.breaker.recovery_timeout_ms, 30_000);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.base_delay_ms, 1_000);
        assert_eq!(config.retry.max_delay_ms, 10_000);
        assert_eq!(config.batch.max_workers, 5);
        assert_eq!(config.validation.required_fields.len(), 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_other_defaults() {
        let config = IntakeConfig::from_json_str(
            r#"{"breaker": {"failure_threshold": 2}, "batch": {"max_workers": 8}}"#,
        )
        .unwrap();

        assert_eq!(config.breaker.failure_threshold, 2);
        assert_eq!(config.breaker.recovery_timeout_ms, 30_000);
        assert_eq!(config.batch.max_workers, 8);
        assert_eq!(config.retry, RetryPolicy::default());
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let err = IntakeConfig::from_json_str(r#"{"batch": {"max_workers": 0}}"#).unwrap_err();
        assert!(err.to_string().contains("batch.max_workers"));
    }

    #[test]
    fn test_validate_rejects_shrinking_multiplier() {
        let config = IntakeConfig::new().with_retry(RetryPolicy::default().with_multiplier(0.5));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_json() {
        let err = IntakeConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, IntakeflowError::Serialization(_)));
    }

    #[test]
    fn test_lock_wait_timeout_roundtrip() {
        let config =
            IdempotencyConfig::default().with_lock_wait_timeout(Duration::from_millis(250));
        assert_eq!(config.lock_wait_timeout(), Some(Duration::from_millis(250)));
    }
}
