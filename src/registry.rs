//! Explicit directory of pools keyed by resource type and name

use std::any::{Any, TypeId, type_name};
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::config::DEFAULT_POOL_NAME;
use crate::errors::{PoolError, PoolResult};
use crate::erased::DynPool;
use crate::policy::Policy;
use crate::pool::ObjectPool;

type Key = (TypeId, String);

struct Registered {
    typed: Arc<dyn Any + Send + Sync>,
    erased: Arc<dyn DynPool>,
}

/// Registry of pools owned by the application
///
/// # Examples
///
/// ```
/// use esox_resourcepool::{DefaultPolicy, PoolConfiguration, PoolRegistry};
///
/// let registry = PoolRegistry::new();
/// registry
///     .create(DefaultPolicy::new(PoolConfiguration::new().with_name("ok"), || 7u32))
///     .unwrap();
///
/// let pool = registry.get::<u32>("ok").unwrap();
/// assert_eq!(*pool.acquire(None).unwrap().unwrap(), 7);
/// assert!(registry.get::<u32>("missing").is_err());
/// ```
#[derive(Default)]
pub struct PoolRegistry {
    pools: DashMap<Key, Registered>,
}

fn normalize(name: &str) -> String {
    if name.trim().is_empty() {
        DEFAULT_POOL_NAME.to_string()
    } else {
        name.to_string()
    }
}

impl PoolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a pool from `policy` and register it under the policy's name
    pub fn create<T, P>(&self, policy: P) -> PoolResult<ObjectPool<T>>
    where
        T: Send + 'static,
        P: Policy<T> + 'static,
    {
        let name = policy.configuration().effective_name().to_string();
        if self.contains::<T>(&name) {
            return Err(PoolError::AlreadyRegistered {
                type_name: type_name::<T>(),
                name,
            });
        }
        let pool = ObjectPool::new(policy)?;
        self.insert(pool.clone())?;
        Ok(pool)
    }

    /// Register an existing pool under its own name
    pub fn insert<T: Send + 'static>(&self, pool: ObjectPool<T>) -> PoolResult<()> {
        let name = normalize(pool.name());
        match self.pools.entry((TypeId::of::<T>(), name)) {
            Entry::Occupied(entry) => Err(PoolError::AlreadyRegistered {
                type_name: type_name::<T>(),
                name: entry.key().1.clone(),
            }),
            Entry::Vacant(entry) => {
                tracing::debug!(pool = %entry.key().1, type_name = type_name::<T>(), "registered pool");
                entry.insert(Registered {
                    typed: Arc::new(pool.clone()),
                    erased: Arc::new(pool),
                });
                Ok(())
            }
        }
    }

    pub fn get<T: Send + 'static>(&self, name: &str) -> PoolResult<ObjectPool<T>> {
        let name = normalize(name);
        self.pools
            .get(&(TypeId::of::<T>(), name.clone()))
            .and_then(|entry| entry.typed.downcast_ref::<ObjectPool<T>>().cloned())
            .ok_or(PoolError::NotRegistered {
                type_name: type_name::<T>(),
                name,
            })
    }

    /// Pool registered under [`DEFAULT_POOL_NAME`]
    pub fn get_default<T: Send + 'static>(&self) -> PoolResult<ObjectPool<T>> {
        self.get(DEFAULT_POOL_NAME)
    }

    /// Type-erased lookup for callers that hold a runtime type id
    pub fn get_dyn(&self, type_id: TypeId, name: &str) -> Option<Arc<dyn DynPool>> {
        self.pools
            .get(&(type_id, normalize(name)))
            .map(|entry| Arc::clone(&entry.erased))
    }

    pub fn contains<T: Send + 'static>(&self, name: &str) -> bool {
        self.pools.contains_key(&(TypeId::of::<T>(), normalize(name)))
    }

    /// Unregister and dispose a pool; returns whether it was present
    pub fn remove<T: Send + 'static>(&self, name: &str) -> bool {
        match self.pools.remove(&(TypeId::of::<T>(), normalize(name))) {
            Some((_, registered)) => {
                registered.erased.dispose();
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// Dispose and forget every registered pool
    pub fn dispose_all(&self) {
        let keys: Vec<Key> = self.pools.iter().map(|entry| entry.key().clone()).collect();
        for key in keys {
            if let Some((_, registered)) = self.pools.remove(&key) {
                registered.erased.dispose();
            }
        }
    }
}
