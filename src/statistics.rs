//! Point-in-time statistics for resource pools

use std::collections::HashMap;
use std::fmt;
use std::time::SystemTime;

#[cfg(feature = "serde")]
use serde::Serialize;

/// Lightweight pool counters
///
/// Each counter is read independently, so a snapshot taken under load is
/// approximate.
///
/// # Examples
///
/// ```
/// use esox_resourcepool::{DefaultPolicy, ObjectPool, PoolConfiguration};
///
/// let pool = ObjectPool::new(DefaultPolicy::new(PoolConfiguration::new(), || 1)).unwrap();
///
/// {
///     let _obj = pool.acquire(None).unwrap();
///     let stats = pool.statistics();
///     assert_eq!(stats.total_objects, 1);
///     assert_eq!(stats.free_objects, 0);
/// }
///
/// assert_eq!(pool.statistics().to_string(), "Pool: 1/1, Get wait: 0, GetAsync wait: 0");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct PoolStatistics {
    /// Handles sitting in the free list
    pub free_objects: usize,

    /// Handles created so far
    pub total_objects: usize,

    /// Queued synchronous acquirers, including abandoned entries not yet drained
    pub sync_waiting: usize,

    /// Queued asynchronous acquirers, including cancelled entries not yet drained
    pub async_waiting: usize,
}

impl PoolStatistics {
    /// Handles currently lent out or pending hand-off
    pub fn in_use(&self) -> usize {
        self.total_objects.saturating_sub(self.free_objects)
    }

    /// Export statistics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut stats = HashMap::new();
        stats.insert("free_objects".to_string(), self.free_objects.to_string());
        stats.insert("total_objects".to_string(), self.total_objects.to_string());
        stats.insert("sync_waiting".to_string(), self.sync_waiting.to_string());
        stats.insert("async_waiting".to_string(), self.async_waiting.to_string());
        stats
    }
}

impl fmt::Display for PoolStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Pool: {}/{}, Get wait: {}, GetAsync wait: {}",
            self.free_objects, self.total_objects, self.sync_waiting, self.async_waiting
        )
    }
}

/// Usage details of a single handle
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct HandleStatistics {
    pub id: usize,

    /// `Debug` rendering of the value, `None` while lent out
    pub value: Option<String>,

    pub total_acquired: u64,
    pub created_at: SystemTime,
    pub last_acquired_at: SystemTime,
    pub last_recycled_at: SystemTime,
    pub last_acquired_thread: Option<String>,
    pub last_recycled_thread: Option<String>,
}

impl fmt::Display for HandleStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} acquired {} time(s), last acquired by {}, last recycled by {}",
            self.id,
            self.value.as_deref().unwrap_or("<in use>"),
            self.total_acquired,
            self.last_acquired_thread.as_deref().unwrap_or("-"),
            self.last_recycled_thread.as_deref().unwrap_or("-"),
        )
    }
}

/// Pool counters plus every handle's details, for diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct FullStatistics {
    pub pool_name: String,
    pub statistics: PoolStatistics,

    /// Stored error while the pool is unavailable
    pub unavailable: Option<String>,

    pub handles: Vec<HandleStatistics>,
}

impl fmt::Display for FullStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[{}] {}", self.pool_name, self.statistics)?;
        if let Some(reason) = &self.unavailable {
            writeln!(f, "Unavailable: {reason}")?;
        }
        for handle in &self.handles {
            writeln!(f, "{handle}")?;
        }
        Ok(())
    }
}
