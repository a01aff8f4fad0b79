//! # Esox ResourcePool
//!
//! Thread-safe pool of expensive-to-create, reusable resources such as
//! connections, with both blocking and async acquisition.
//!
//! ## Features
//!
//! - Lazy creation up to a fixed capacity through a caller-supplied [`Policy`]
//! - Blocking acquire with per-call timeout, and async acquire with bounded queueing
//! - Strict FIFO hand-off across sync and async waiters
//! - Idle revalidation: values untouched past the idle timeout are recreated
//! - Availability circuit with background recovery probes
//! - Idempotent release, automatic return via RAII (Drop trait)
//! - Statistics snapshots and Prometheus gauges
//! - Explicit registry and a type-erased view for dynamic callers
//!
//! ## Quick Start
//!
//! ```rust
//! use esox_resourcepool::{DefaultPolicy, ObjectPool, PoolConfiguration};
//!
//! let policy = DefaultPolicy::new(PoolConfiguration::new().with_pool_size(4), || {
//!     String::from("connection")
//! });
//! let pool = ObjectPool::new(policy).unwrap();
//! {
//!     let obj = pool.acquire(None).unwrap().unwrap();
//!     println!("Got: {}", *obj);
//!     // Object automatically returned when `obj` goes out of scope
//! }
//! pool.dispose();
//! ```

mod availability;
mod config;
mod erased;
mod errors;
mod handle;
#[cfg(feature = "metrics")]
mod metrics;
mod policy;
mod pool;
mod registry;
mod statistics;
mod waiter;

pub use availability::AvailabilityState;
pub use config::{DEFAULT_POOL_NAME, PoolConfiguration};
pub use erased::{DynPool, DynPooledObject};
pub use errors::{BoxError, PoolError, PoolResult, SharedError};
pub use handle::PooledObject;
#[cfg(feature = "metrics")]
pub use metrics::PoolMetrics;
pub use policy::{DefaultPolicy, Policy};
pub use pool::ObjectPool;
pub use registry::PoolRegistry;
pub use statistics::{FullStatistics, HandleStatistics, PoolStatistics};

/// Re-exported so custom policies can implement the async hook
pub use async_trait::async_trait;
