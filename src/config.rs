//! Pool configuration options

use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::errors::{PoolError, PoolResult};

/// Configuration for pool behavior
///
/// # Examples
///
/// ```
/// use esox_resizable_pool::PoolConfiguration;
/// use std::time::Duration;
///
/// let config = PoolConfiguration::new()
///     .with_max_pool_size(16)
///     .with_timeout(Duration::from_secs(5))
///     .with_retry_interval(Duration::from_millis(2));
///
/// assert_eq!(config.max_pool_size, 16);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PoolConfiguration {
    /// Initial maximum number of objects the pool may own; changed later by resize
    pub max_pool_size: usize,

    /// How long `rent_async` waits for an object before giving up
    pub operation_timeout: Duration,

    /// How often `rent_async` retries while the pool is full
    pub retry_interval: Duration,
}

impl Default for PoolConfiguration {
    fn default() -> Self {
        Self {
            max_pool_size: 100,
            operation_timeout: Duration::from_secs(30),
            retry_interval: Duration::from_millis(10),
        }
    }
}

impl PoolConfiguration {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the initial maximum pool size
    pub fn with_max_pool_size(mut self, size: usize) -> Self {
        self.max_pool_size = size;
        self
    }

    /// Set the timeout for `rent_async`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Set the retry interval for `rent_async`
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Check the configuration for values the pool cannot work with
    pub fn validate(&self) -> PoolResult<()> {
        if self.operation_timeout.is_zero() {
            return Err(PoolError::InvalidConfiguration(
                "operation_timeout must be greater than zero".to_string(),
            ));
        }
        if self.retry_interval.is_zero() {
            return Err(PoolError::InvalidConfiguration(
                "retry_interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PoolConfiguration::default();
        assert_eq!(config.max_pool_size, 100);
        assert_eq!(config.operation_timeout, Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_durations_rejected() {
        let config = PoolConfiguration::new().with_retry_interval(Duration::ZERO);
        assert!(matches!(
            config.validate(),
            Err(PoolError::InvalidConfiguration(_))
        ));

        let config = PoolConfiguration::new().with_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_max_size_is_allowed() {
        let config = PoolConfiguration::new().with_max_pool_size(0);
        assert!(config.validate().is_ok());
    }
}
