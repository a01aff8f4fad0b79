//! Pool configuration options

use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::errors::{PoolError, PoolResult};

/// Name used when a configuration does not carry one
pub const DEFAULT_POOL_NAME: &str = "__default";

/// Configuration for resource pool behavior
///
/// # Examples
///
/// ```
/// use esox_resourcepool::PoolConfiguration;
/// use std::time::Duration;
///
/// let config = PoolConfiguration::new()
///     .with_name("db")
///     .with_pool_size(16)
///     .with_sync_timeout(Duration::from_secs(2))
///     .with_idle_timeout(Duration::from_secs(30));
///
/// assert_eq!(config.pool_size, 16);
/// assert_eq!(config.name, "db");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoolConfiguration {
    /// Pool name, used in logs and errors
    pub name: String,

    /// Maximum number of handles the pool will ever create
    pub pool_size: usize,

    /// Default wait for a synchronous acquire
    pub sync_get_timeout: Duration,

    /// A handle idle for longer than this has its value recreated on the next acquire.
    /// Zero disables revalidation.
    pub idle_timeout: Duration,

    /// Maximum number of queued async acquirers; zero means unbounded
    pub async_get_capacity: usize,

    /// Whether a timed-out synchronous acquire returns an error rather than `None`
    pub throw_on_get_timeout: bool,

    /// Whether [`ObjectPool::notify_process_exit`](crate::ObjectPool::notify_process_exit) disposes the pool
    pub auto_dispose_with_system: bool,

    /// Delay between background recovery probes while unavailable
    pub check_available_interval: Duration,
}

impl Default for PoolConfiguration {
    fn default() -> Self {
        Self {
            name: DEFAULT_POOL_NAME.to_string(),
            pool_size: 1_000,
            sync_get_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(50),
            async_get_capacity: 10_000,
            throw_on_get_timeout: true,
            auto_dispose_with_system: true,
            check_available_interval: Duration::from_secs(5),
        }
    }
}

impl PoolConfiguration {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pool name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the maximum pool size
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_resourcepool::PoolConfiguration;
    ///
    /// let config = PoolConfiguration::new().with_pool_size(50);
    ///
    /// assert_eq!(config.pool_size, 50);
    /// ```
    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool_size = size;
        self
    }

    /// Set the default synchronous acquire timeout
    pub fn with_sync_timeout(mut self, timeout: Duration) -> Self {
        self.sync_get_timeout = timeout;
        self
    }

    /// Set idle timeout for handles
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set the async waiter queue capacity
    pub fn with_async_capacity(mut self, capacity: usize) -> Self {
        self.async_get_capacity = capacity;
        self
    }

    /// Choose between an error and `None` when a synchronous acquire times out
    pub fn with_throw_on_timeout(mut self, throw: bool) -> Self {
        self.throw_on_get_timeout = throw;
        self
    }

    pub fn with_auto_dispose(mut self, enabled: bool) -> Self {
        self.auto_dispose_with_system = enabled;
        self
    }

    /// Set the recovery recheck interval
    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_available_interval = interval;
        self
    }

    /// Effective pool name, falling back to [`DEFAULT_POOL_NAME`]
    pub fn effective_name(&self) -> &str {
        if self.name.trim().is_empty() {
            DEFAULT_POOL_NAME
        } else {
            &self.name
        }
    }

    pub(crate) fn validate(&self) -> PoolResult<()> {
        if self.pool_size == 0 {
            return Err(PoolError::InvalidConfiguration(
                "pool_size must be greater than zero".to_string(),
            ));
        }
        if self.check_available_interval.is_zero() {
            return Err(PoolError::InvalidConfiguration(
                "check_available_interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
