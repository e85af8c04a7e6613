//! Configuration types.

use chrono::FixedOffset;
use std::time::Duration;

use crate::error::{ConfigError, FootholdError, FootholdResult};

/// Retry configuration for the catalog fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total number of attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubled for each later attempt.
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryConfig {
    /// Backoff delay after a failed attempt (1-based).
    ///
    /// Attempt 1 -> base, attempt 2 -> 2x base, and so on.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(factor)
    }
}

/// Master configuration for a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Maximum age at which a persisted catalog is reused without a fetch.
    pub catalog_ttl: Duration,
    /// Catalog fetch retry policy.
    pub retry: RetryConfig,
    /// Per-entry ceiling for persisted payloads, in bytes.
    pub max_entry_bytes: usize,
    /// Cumulative ceiling for the persistent store, in bytes.
    pub max_store_bytes: usize,
    /// Offset used to bucket submission timestamps into calendar dates.
    pub utc_offset: FixedOffset,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            catalog_ttl: Duration::from_secs(6 * 60 * 60),
            retry: RetryConfig::default(),
            max_entry_bytes: 2 * 1024 * 1024,
            max_store_bytes: 4 * 1024 * 1024,
            utc_offset: FixedOffset::east_opt(0).expect("zero offset is valid"),
        }
    }
}

impl SessionConfig {
    /// Default configuration bucketing dates in the process-local timezone.
    pub fn local() -> Self {
        Self::default().with_utc_offset(*chrono::Local::now().offset())
    }

    /// Set the catalog TTL.
    pub fn with_catalog_ttl(mut self, ttl: Duration) -> Self {
        self.catalog_ttl = ttl;
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set the per-entry byte ceiling.
    pub fn with_max_entry_bytes(mut self, bytes: usize) -> Self {
        self.max_entry_bytes = bytes;
        self
    }

    /// Set the cumulative store byte ceiling.
    pub fn with_max_store_bytes(mut self, bytes: usize) -> Self {
        self.max_store_bytes = bytes;
        self
    }

    /// Set the calendar-bucketing offset.
    pub fn with_utc_offset(mut self, offset: FixedOffset) -> Self {
        self.utc_offset = offset;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> FootholdResult<()> {
        if self.catalog_ttl.is_zero() {
            return Err(FootholdError::Config(ConfigError::InvalidValue {
                field: "catalog_ttl".to_string(),
                value: format!("{:?}", self.catalog_ttl),
                reason: "catalog_ttl must be positive".to_string(),
            }));
        }

        if self.retry.max_attempts == 0 {
            return Err(FootholdError::Config(ConfigError::InvalidValue {
                field: "retry.max_attempts".to_string(),
                value: self.retry.max_attempts.to_string(),
                reason: "at least one attempt is required".to_string(),
            }));
        }

        if self.retry.base_delay.is_zero() {
            return Err(FootholdError::Config(ConfigError::InvalidValue {
                field: "retry.base_delay".to_string(),
                value: format!("{:?}", self.retry.base_delay),
                reason: "base_delay must be positive".to_string(),
            }));
        }

        if self.max_entry_bytes == 0 || self.max_store_bytes == 0 {
            return Err(FootholdError::Config(ConfigError::InvalidValue {
                field: "max_entry_bytes/max_store_bytes".to_string(),
                value: format!("{}/{}", self.max_entry_bytes, self.max_store_bytes),
                reason: "store ceilings must be positive".to_string(),
            }));
        }

        if self.max_entry_bytes > self.max_store_bytes {
            return Err(FootholdError::Config(ConfigError::InvalidValue {
                field: "max_entry_bytes".to_string(),
                value: self.max_entry_bytes.to_string(),
                reason: "per-entry ceiling cannot exceed the store ceiling".to_string(),
            }));
        }

        Ok(())
    }
}
