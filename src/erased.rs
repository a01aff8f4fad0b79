//! Type-erased view of a pool for callers that only know the resource type at runtime

use std::any::{Any, type_name};
use std::time::Duration;

use crate::errors::PoolResult;
use crate::handle::PooledObject;
use crate::pool::ObjectPool;
use crate::statistics::PoolStatistics;

/// Minimal capabilities of a pool with its resource type erased
pub trait DynPool: Send + Sync {
    fn name(&self) -> &str;

    /// Name of the pooled resource type
    fn type_name(&self) -> &'static str;

    /// Same contract as [`ObjectPool::acquire`]
    fn acquire_dyn(&self, timeout: Option<Duration>) -> PoolResult<Option<Box<dyn DynPooledObject>>>;

    fn statistics(&self) -> PoolStatistics;

    fn is_available(&self) -> bool;

    fn dispose(&self);

    /// Recover the typed pool via `downcast_ref::<ObjectPool<T>>()`
    fn as_any(&self) -> &dyn Any;
}

/// A lent object whose value is only reachable through [`Any`]
pub trait DynPooledObject: Send {
    fn id(&self) -> usize;

    fn value_any(&self) -> &dyn Any;

    fn value_any_mut(&mut self) -> &mut dyn Any;

    /// Return the object, optionally recreating its value
    fn release(self: Box<Self>, reset: bool);
}

impl<T: Send + 'static> DynPooledObject for PooledObject<T> {
    fn id(&self) -> usize {
        PooledObject::id(self)
    }

    fn value_any(&self) -> &dyn Any {
        &**self
    }

    fn value_any_mut(&mut self) -> &mut dyn Any {
        &mut **self
    }

    fn release(mut self: Box<Self>, reset: bool) {
        self.release_inner(reset);
    }
}

impl<T: Send + 'static> DynPool for ObjectPool<T> {
    fn name(&self) -> &str {
        ObjectPool::name(self)
    }

    fn type_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn acquire_dyn(&self, timeout: Option<Duration>) -> PoolResult<Option<Box<dyn DynPooledObject>>> {
        Ok(self
            .acquire(timeout)?
            .map(|obj| Box::new(obj) as Box<dyn DynPooledObject>))
    }

    fn statistics(&self) -> PoolStatistics {
        ObjectPool::statistics(self)
    }

    fn is_available(&self) -> bool {
        ObjectPool::is_available(self)
    }

    fn dispose(&self) {
        ObjectPool::dispose(self);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
