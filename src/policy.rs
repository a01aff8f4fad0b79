//! Lifecycle policy supplied by the pool owner

use async_trait::async_trait;

use crate::config::PoolConfiguration;
use crate::errors::BoxError;
use crate::handle::PooledObject;

/// Configuration and lifecycle hooks for an [`ObjectPool`](crate::ObjectPool).
///
/// Only [`configuration`](Policy::configuration) and [`on_create`](Policy::on_create)
/// are required. Errors from hooks on the acquire path reach the caller; errors
/// from `on_destroy` and `on_release` are logged and dropped.
#[async_trait]
pub trait Policy<T: Send + 'static>: Send + Sync {
    fn configuration(&self) -> &PoolConfiguration;

    /// Build a fresh value for a new or reset handle.
    fn on_create(&self) -> Result<T, BoxError>;

    /// Tear down a value. The value is dropped once this returns.
    fn on_destroy(&self, value: T) -> Result<(), BoxError> {
        drop(value);
        Ok(())
    }

    /// Runs before a synchronous acquire hands the object out.
    fn on_acquire(&self, _obj: &mut PooledObject<T>) -> Result<(), BoxError> {
        Ok(())
    }

    /// Runs before an asynchronous acquire hands the object out.
    async fn on_acquire_async(&self, obj: &mut PooledObject<T>) -> Result<(), BoxError> {
        self.on_acquire(obj)
    }

    /// Runs when a released object goes back to the free list rather than to a waiter.
    fn on_release(&self, _obj: &mut PooledObject<T>) -> Result<(), BoxError> {
        Ok(())
    }

    /// Health probe used while the pool is unavailable.
    fn on_check_available(&self, _obj: &mut PooledObject<T>) -> Result<bool, BoxError> {
        Ok(true)
    }

    fn on_available(&self) {}

    fn on_unavailable(&self) {}

    /// Runs when a synchronous acquire gives up waiting.
    fn on_acquire_timeout(&self) {}
}

type Factory<T> = Box<dyn Fn() -> Result<T, BoxError> + Send + Sync>;
type AcquireCallback<T> = Box<dyn Fn(&mut PooledObject<T>) + Send + Sync>;

/// Policy built from a factory closure
///
/// # Examples
///
/// ```
/// use esox_resourcepool::{DefaultPolicy, ObjectPool, PoolConfiguration};
///
/// let policy = DefaultPolicy::new(PoolConfiguration::new().with_name("buffers"), || {
///     Vec::<u8>::with_capacity(4096)
/// })
/// .with_on_acquire(|buf| buf.clear());
///
/// let pool = ObjectPool::new(policy).unwrap();
/// let buf = pool.acquire(None).unwrap().unwrap();
/// assert!(buf.capacity() >= 4096);
/// ```
pub struct DefaultPolicy<T: Send + 'static> {
    configuration: PoolConfiguration,
    factory: Factory<T>,
    on_acquire: Option<AcquireCallback<T>>,
}

impl<T: Send + 'static> DefaultPolicy<T> {
    pub fn new<F>(configuration: PoolConfiguration, factory: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::fallible(configuration, move || Ok(factory()))
    }

    /// Create a policy whose factory may fail
    pub fn fallible<F>(configuration: PoolConfiguration, factory: F) -> Self
    where
        F: Fn() -> Result<T, BoxError> + Send + Sync + 'static,
    {
        Self {
            configuration,
            factory: Box::new(factory),
            on_acquire: None,
        }
    }

    /// Run `callback` on every object before it is handed out
    pub fn with_on_acquire<F>(mut self, callback: F) -> Self
    where
        F: Fn(&mut PooledObject<T>) + Send + Sync + 'static,
    {
        self.on_acquire = Some(Box::new(callback));
        self
    }
}

#[async_trait]
impl<T: Send + 'static> Policy<T> for DefaultPolicy<T> {
    fn configuration(&self) -> &PoolConfiguration {
        &self.configuration
    }

    fn on_create(&self) -> Result<T, BoxError> {
        (self.factory)()
    }

    fn on_acquire(&self, obj: &mut PooledObject<T>) -> Result<(), BoxError> {
        if let Some(callback) = &self.on_acquire {
            callback(obj);
        }
        Ok(())
    }
}
