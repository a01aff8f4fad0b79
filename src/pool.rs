//! Core resource pool implementation

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, SystemTime};

use crossbeam::queue::ArrayQueue;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::availability::{Availability, AvailabilityState};
use crate::config::PoolConfiguration;
use crate::errors::{BoxError, PoolError, PoolResult, SharedError, best_effort};
use crate::handle::{PooledObject, Slot};
use crate::policy::Policy;
use crate::statistics::{FullStatistics, PoolStatistics};
use crate::waiter::{SyncWaiter, WaitOutcome, WaitQueue};

/// Shared state behind every [`ObjectPool`] clone and every lent [`PooledObject`].
pub(crate) struct PoolInner<T: Send + 'static> {
    pub(crate) name: String,
    pub(crate) policy: Arc<dyn Policy<T>>,
    running: AtomicBool,
    free: ArrayQueue<Arc<Slot<T>>>,
    /// Growth lock: every handle ever created, bounded by `pool_size`.
    pub(crate) all: Mutex<Vec<Arc<Slot<T>>>>,
    total: AtomicUsize,
    waiters: WaitQueue<T>,
    pub(crate) availability: Availability,
}

impl<T: Send + 'static> PoolInner<T> {
    pub(crate) fn config(&self) -> &PoolConfiguration {
        self.policy.configuration()
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub(crate) fn statistics(&self) -> PoolStatistics {
        PoolStatistics {
            free_objects: self.free.len(),
            total_objects: self.total.load(Ordering::Relaxed),
            sync_waiting: self.waiters.sync_len(),
            async_waiting: self.waiters.async_len(),
        }
    }

    /// Pop a free handle or grow the pool, then make sure the value is fresh.
    ///
    /// `Ok(None)` means the pool is at capacity with nothing free.
    pub(crate) fn get_or_create_free(
        self: &Arc<Self>,
        check_availability: bool,
    ) -> PoolResult<Option<PooledObject<T>>> {
        if !self.is_running() {
            return Err(PoolError::Disposed(self.name.clone()));
        }
        if check_availability && let Some(reason) = self.availability.reason() {
            return Err(PoolError::Unavailable {
                name: self.name.clone(),
                reason,
            });
        }

        let slot = match self.free.pop() {
            Some(slot) => slot,
            None => match self.grow() {
                Some(slot) => slot,
                None => return Ok(None),
            },
        };
        slot.set_recycled(false);
        let value = slot.take_value();
        self.activate(PooledObject::lease(slot, value, Arc::clone(self)))
            .map(Some)
    }

    /// Reserve a new empty slot under the growth lock; `activate` fills it.
    fn grow(&self) -> Option<Arc<Slot<T>>> {
        let capacity = self.config().pool_size;
        if self.total.load(Ordering::Acquire) >= capacity {
            return None;
        }
        let mut all = self.all.lock();
        if all.len() >= capacity {
            return None;
        }
        let slot = Arc::new(Slot::new(all.len(), None));
        all.push(Arc::clone(&slot));
        self.total.store(all.len(), Ordering::Release);
        tracing::debug!(pool = %self.name, id = slot.id(), "reserved pooled object");
        Some(slot)
    }

    /// Ensure a leased handle carries a usable value, recreating absent or idle ones.
    fn activate(self: &Arc<Self>, mut lease: PooledObject<T>) -> PoolResult<PooledObject<T>> {
        let stale = match lease.slot() {
            Some(slot) => slot.is_idle(self.config().idle_timeout),
            None => false,
        };
        if stale || !lease.has_value() {
            let old = lease.take_value();
            match self.recreate(lease.slot(), old) {
                Ok(value) => lease.set_value(value),
                Err(error) => {
                    lease.release();
                    return Err(error);
                }
            }
        }
        Ok(lease)
    }

    /// Destroy the old value (best effort) and create a new one.
    fn recreate(&self, slot: Option<&Arc<Slot<T>>>, old: Option<T>) -> PoolResult<T> {
        if let Some(old) = old {
            best_effort(&self.name, "on_destroy", self.policy.on_destroy(old));
        }
        let value = self
            .policy
            .on_create()
            .map_err(|error| PoolError::hook("on_create", error))?;
        if let Some(slot) = slot {
            slot.mark_recycled();
            tracing::debug!(pool = %self.name, id = slot.id(), "created pooled object value");
        }
        Ok(value)
    }

    pub(crate) fn release_parts(self: &Arc<Self>, slot: Arc<Slot<T>>, mut value: Option<T>, reset: bool) {
        if slot.is_recycled() {
            return;
        }
        if !self.is_running() {
            if let Some(value) = value {
                best_effort(&self.name, "on_destroy", self.policy.on_destroy(value));
            }
            return;
        }
        if reset {
            match self.recreate(Some(&slot), value.take()) {
                Ok(fresh) => value = Some(fresh),
                Err(error) => best_effort(&self.name, "reset", Err(error)),
            }
        }

        slot.mark_recycled();
        let lease = PooledObject::lease(slot, value, Arc::clone(self));
        let Some(mut lease) = self.waiters.hand_off(lease) else {
            return;
        };

        if lease.has_value() {
            best_effort(&self.name, "on_release", self.policy.on_release(&mut lease));
        }
        let Some((slot, value)) = lease.into_parts() else {
            return;
        };
        self.push_free(slot, value);

        // a waiter may have queued after `hand_off` found the queue empty,
        // and its own recheck may have run before the push above
        while self.is_running() && !self.waiters.is_empty() {
            let Some(slot) = self.free.pop() else {
                break;
            };
            slot.set_recycled(false);
            let value = slot.take_value();
            let lease = PooledObject::lease(slot, value, Arc::clone(self));
            let Some(lease) = self.waiters.hand_off(lease) else {
                continue;
            };
            let Some((slot, value)) = lease.into_parts() else {
                break;
            };
            self.push_free(slot, value);
        }

        // lost a race with dispose
        if !self.is_running() {
            self.destroy_free();
        }
    }

    fn push_free(&self, slot: Arc<Slot<T>>, value: Option<T>) {
        slot.put_value(value);
        slot.set_recycled(true);
        if self.free.push(slot).is_err() {
            tracing::error!(pool = %self.name, "free list overflow");
        }
    }

    fn destroy_free(&self) {
        while let Some(slot) = self.free.pop() {
            if let Some(value) = slot.take_value() {
                best_effort(&self.name, "on_destroy", self.policy.on_destroy(value));
            }
        }
    }

    fn wait_sync(self: &Arc<Self>, timeout: Duration) -> PoolResult<Option<PooledObject<T>>> {
        let waiter = Arc::new(SyncWaiter::new());
        let _ticket = self.waiters.push_sync(Arc::clone(&waiter));
        tracing::trace!(pool = %self.name, ?timeout, "queued sync acquire");

        // a release or dispose may have slipped in before the entry was queued
        match self.get_or_create_free(true) {
            Ok(None) => {}
            Ok(Some(obj)) => {
                drop(waiter.abandon());
                return Ok(Some(obj));
            }
            Err(error) => {
                drop(waiter.abandon());
                return Err(error);
            }
        }

        match waiter.wait(timeout) {
            WaitOutcome::Delivered(lease) => self.activate(lease).map(Some),
            WaitOutcome::TimedOut => Ok(None),
            WaitOutcome::Closed => Err(PoolError::Disposed(self.name.clone())),
        }
    }

    async fn wait_async(self: &Arc<Self>) -> PoolResult<PooledObject<T>> {
        let capacity = self.config().async_get_capacity;
        if capacity > 0 && self.waiters.async_len() >= capacity - 1 {
            return Err(PoolError::QueueFull(capacity));
        }

        let (sender, mut receiver) = oneshot::channel();
        // dropped with this future, so a cancelled acquirer stops counting
        let _ticket = self.waiters.push_async(sender);
        tracing::trace!(pool = %self.name, "queued async acquire");

        // a release or dispose may have slipped in before the entry was queued
        let early = match self.get_or_create_free(true) {
            Ok(None) => None,
            Ok(Some(obj)) => Some(Ok(obj)),
            Err(error) => Some(Err(error)),
        };
        if let Some(result) = early {
            receiver.close();
            // anything delivered meanwhile goes straight back through its drop
            drop(receiver.try_recv());
            return result;
        }

        match receiver.await {
            Ok(lease) => self.activate(lease),
            Err(_) => Err(PoolError::Disposed(self.name.clone())),
        }
    }

    pub(crate) fn dispose(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        tracing::debug!(pool = %self.name, "disposing pool");

        self.stop_recovery();
        self.destroy_free();
        self.waiters.close_all();

        let slots = std::mem::take(&mut *self.all.lock());
        self.total.store(0, Ordering::Release);
        for slot in slots {
            if let Some(value) = slot.take_value() {
                best_effort(&self.name, "on_destroy", self.policy.on_destroy(value));
            }
        }
    }
}

impl<T: Send + 'static> Drop for PoolInner<T> {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Thread-safe pool of reusable resources
///
/// Cloning is cheap and yields another handle to the same pool.
///
/// # Examples
///
/// ```
/// use esox_resourcepool::{DefaultPolicy, ObjectPool, PoolConfiguration};
///
/// let pool = ObjectPool::new(DefaultPolicy::new(
///     PoolConfiguration::new().with_pool_size(2),
///     || 42,
/// ))
/// .unwrap();
///
/// {
///     let obj = pool.acquire(None).unwrap().unwrap();
///     assert_eq!(*obj, 42);
///     // Object automatically returned when `obj` goes out of scope
/// }
///
/// assert_eq!(pool.statistics().free_objects, 1);
/// ```
pub struct ObjectPool<T: Send + 'static> {
    pub(crate) inner: Arc<PoolInner<T>>,
}

impl<T: Send + 'static> Clone for ObjectPool<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + 'static> ObjectPool<T> {
    /// Create a pool driven by `policy`. No values are created until first use.
    pub fn new<P>(policy: P) -> PoolResult<Self>
    where
        P: Policy<T> + 'static,
    {
        Self::with_policy(Arc::new(policy))
    }

    /// Create a pool from an already shared policy
    pub fn with_policy(policy: Arc<dyn Policy<T>>) -> PoolResult<Self> {
        let config = policy.configuration();
        config.validate()?;
        let name = config.effective_name().to_string();
        let capacity = config.pool_size;

        Ok(Self {
            inner: Arc::new(PoolInner {
                name,
                running: AtomicBool::new(true),
                free: ArrayQueue::new(capacity),
                all: Mutex::new(Vec::new()),
                total: AtomicUsize::new(0),
                waiters: WaitQueue::new(),
                availability: Availability::new(),
                policy,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn policy(&self) -> &dyn Policy<T> {
        self.inner.policy.as_ref()
    }

    pub fn configuration(&self) -> &PoolConfiguration {
        self.inner.config()
    }

    /// Whether the pool has not been disposed
    pub fn is_running(&self) -> bool {
        self.inner.is_running()
    }

    /// Acquire an object, blocking up to `timeout` (or the configured default).
    ///
    /// Returns `Ok(None)` on timeout when the configuration does not ask for
    /// [`PoolError::Timeout`].
    pub fn acquire(&self, timeout: Option<Duration>) -> PoolResult<Option<PooledObject<T>>> {
        let inner = &self.inner;
        let mut obj = match inner.get_or_create_free(true)? {
            Some(obj) => obj,
            None => {
                let timeout = timeout.unwrap_or(inner.config().sync_get_timeout);
                match inner.wait_sync(timeout)? {
                    Some(obj) => obj,
                    None => {
                        inner.policy.on_acquire_timeout();
                        tracing::debug!(pool = %inner.name, ?timeout, "acquire timed out");
                        if inner.config().throw_on_get_timeout {
                            return Err(PoolError::Timeout(timeout));
                        }
                        return Ok(None);
                    }
                }
            }
        };

        if let Err(error) = inner.policy.on_acquire(&mut obj) {
            obj.release();
            return Err(PoolError::hook("on_acquire", error));
        }
        obj.mark_acquired();
        Ok(Some(obj))
    }

    /// Acquire an object only if one is free or can be created right away
    pub fn try_acquire(&self) -> PoolResult<Option<PooledObject<T>>> {
        let inner = &self.inner;
        let Some(mut obj) = inner.get_or_create_free(true)? else {
            return Ok(None);
        };
        if let Err(error) = inner.policy.on_acquire(&mut obj) {
            obj.release();
            return Err(PoolError::hook("on_acquire", error));
        }
        obj.mark_acquired();
        Ok(Some(obj))
    }

    /// Acquire an object asynchronously, waiting in line behind earlier callers.
    ///
    /// Fails immediately with [`PoolError::QueueFull`] when the async queue is at capacity.
    pub async fn acquire_async(&self) -> PoolResult<PooledObject<T>> {
        let inner = &self.inner;
        let mut obj = match inner.get_or_create_free(true)? {
            Some(obj) => obj,
            None => inner.wait_async().await?,
        };

        if let Err(error) = inner.policy.on_acquire_async(&mut obj).await {
            obj.release();
            return Err(PoolError::hook("on_acquire_async", error));
        }
        obj.mark_acquired();
        Ok(obj)
    }

    /// Return an object, optionally recreating its value first. Idempotent.
    pub fn release(&self, obj: &mut PooledObject<T>, reset: bool) {
        obj.release_inner(reset);
    }

    /// Shut the pool down: destroy idle values, wake every waiter and stop recovery.
    ///
    /// Objects still lent out are destroyed when they are released.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    /// Host-driven process shutdown; disposes only when `auto_dispose_with_system` is set.
    pub fn notify_process_exit(&self) -> bool {
        if !self.inner.config().auto_dispose_with_system || !self.is_running() {
            return false;
        }
        self.dispose();
        true
    }

    /// Mark the pool unavailable and start background recovery.
    ///
    /// Returns `false` if the pool was already unavailable.
    pub fn set_unavailable<E>(&self, error: E) -> bool
    where
        E: Into<BoxError>,
    {
        self.inner.set_unavailable(error.into())
    }

    /// Probe once, inline, and restore availability on success
    pub fn live_check_available(&self) -> bool {
        self.inner.live_check_available()
    }

    pub fn is_available(&self) -> bool {
        self.inner.availability.reason().is_none()
    }

    pub fn availability_state(&self) -> AvailabilityState {
        self.inner.availability.state()
    }

    pub fn unavailable_error(&self) -> Option<SharedError> {
        self.inner.availability.error()
    }

    pub fn unavailable_since(&self) -> Option<SystemTime> {
        self.inner.availability.since()
    }

    /// Approximate counters, read without a global lock
    pub fn statistics(&self) -> PoolStatistics {
        self.inner.statistics()
    }

    /// Counters plus per-handle details. Takes the growth lock; not for hot paths.
    pub fn statistics_full(&self) -> FullStatistics
    where
        T: fmt::Debug,
    {
        let handles = self
            .inner
            .all
            .lock()
            .iter()
            .map(|slot| slot.statistics())
            .collect();
        FullStatistics {
            pool_name: self.inner.name.clone(),
            statistics: self.inner.statistics(),
            unavailable: self.inner.availability.error().map(|error| error.to_string()),
            handles,
        }
    }
}

impl<T: Send + 'static> fmt::Debug for ObjectPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectPool")
            .field("name", &self.inner.name)
            .field("running", &self.is_running())
            .field("statistics", &self.statistics())
            .finish()
    }
}
