//! Prometheus gauges fed from pool statistics

use prometheus::{IntGaugeVec, Opts, Registry};

use crate::errors::{PoolError, PoolResult};
use crate::statistics::PoolStatistics;

/// Gauge set for one or more pools, labelled by pool name
///
/// # Examples
///
/// ```
/// use esox_resourcepool::{DefaultPolicy, ObjectPool, PoolConfiguration, PoolMetrics};
///
/// let registry = prometheus::Registry::new();
/// let metrics = PoolMetrics::register(&registry).unwrap();
///
/// let pool = ObjectPool::new(DefaultPolicy::new(
///     PoolConfiguration::new().with_name("my_pool"),
///     || 1,
/// ))
/// .unwrap();
/// let _obj = pool.acquire(None).unwrap();
/// metrics.record(pool.name(), &pool.statistics());
///
/// let families = registry.gather();
/// assert!(families.iter().any(|f| f.get_name() == "objectpool_objects_total"));
/// ```
#[derive(Clone)]
pub struct PoolMetrics {
    free: IntGaugeVec,
    total: IntGaugeVec,
    sync_waiting: IntGaugeVec,
    async_waiting: IntGaugeVec,
}

impl PoolMetrics {
    /// Create the gauges and register them into `registry`
    pub fn register(registry: &Registry) -> PoolResult<Self> {
        let metrics = Self {
            free: gauge("objectpool_objects_free", "Handles in the free list")?,
            total: gauge("objectpool_objects_total", "Handles created")?,
            sync_waiting: gauge("objectpool_waiters_sync", "Queued synchronous acquirers")?,
            async_waiting: gauge("objectpool_waiters_async", "Queued asynchronous acquirers")?,
        };
        for vec in [
            &metrics.free,
            &metrics.total,
            &metrics.sync_waiting,
            &metrics.async_waiting,
        ] {
            registry
                .register(Box::new(vec.clone()))
                .map_err(|e| PoolError::Metrics(e.to_string()))?;
        }
        Ok(metrics)
    }

    /// Publish a snapshot under `pool_name`
    pub fn record(&self, pool_name: &str, stats: &PoolStatistics) {
        let labels = [pool_name];
        self.free.with_label_values(&labels).set(as_gauge(stats.free_objects));
        self.total.with_label_values(&labels).set(as_gauge(stats.total_objects));
        self.sync_waiting
            .with_label_values(&labels)
            .set(as_gauge(stats.sync_waiting));
        self.async_waiting
            .with_label_values(&labels)
            .set(as_gauge(stats.async_waiting));
    }
}

fn gauge(name: &str, help: &str) -> PoolResult<IntGaugeVec> {
    IntGaugeVec::new(Opts::new(name, help), &["pool"]).map_err(|e| PoolError::Metrics(e.to_string()))
}

fn as_gauge(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
