//! Error types for the resource pool

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Error type returned by policy hooks
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Shared form of a hook error, so `PoolError` stays cheap to clone
pub type SharedError = Arc<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug, Clone)]
pub enum PoolError {
    #[error("Pool is empty - no objects available")]
    PoolEmpty,

    #[error("Timed out after {0:?} waiting for a free object")]
    Timeout(Duration),

    #[error("Async wait queue is full (capacity {0})")]
    QueueFull(usize),

    #[error("Pool `{name}` is unavailable: {reason}")]
    Unavailable { name: String, reason: String },

    #[error("Pool `{0}` has been disposed")]
    Disposed(String),

    #[error("Policy hook `{hook}` failed: {error}")]
    Hook {
        hook: &'static str,
        #[source]
        error: SharedError,
    },

    #[error("Availability check did not pass")]
    CheckFailed,

    #[error("Invalid pool configuration: {0}")]
    InvalidConfiguration(String),

    #[error("A pool for `{type_name}` named `{name}` is already registered")]
    AlreadyRegistered { type_name: &'static str, name: String },

    #[error("No pool for `{type_name}` named `{name}` is registered")]
    NotRegistered { type_name: &'static str, name: String },

    #[cfg(feature = "metrics")]
    #[error("Metrics registration failed: {0}")]
    Metrics(String),
}

impl PoolError {
    pub(crate) fn hook(hook: &'static str, error: BoxError) -> Self {
        PoolError::Hook {
            hook,
            error: Arc::from(error),
        }
    }
}

pub type PoolResult<T> = Result<T, PoolError>;

/// Log and discard a failure on a path that must not fail (release, destroy, recovery).
pub(crate) fn best_effort<E: std::fmt::Display>(pool: &str, action: &'static str, result: Result<(), E>) {
    if let Err(error) = result {
        tracing::warn!(pool, action, %error, "ignoring failure");
    }
}
