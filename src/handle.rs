//! Pooled handles and the RAII guard lent to callers

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, ThreadId};
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;

use crate::pool::PoolInner;
use crate::statistics::HandleStatistics;

/// Timestamp written into every handle when the pool recovers, so that the
/// next acquisition of each handle treats it as idle.
pub(crate) fn recovery_sentinel() -> SystemTime {
    // 2000-01-01T00:00:00Z
    SystemTime::UNIX_EPOCH + Duration::from_secs(946_684_800)
}

#[derive(Debug, Clone, Copy)]
struct Usage {
    last_acquired_at: SystemTime,
    last_acquired_thread: Option<ThreadId>,
    last_recycled_at: SystemTime,
    last_recycled_thread: Option<ThreadId>,
}

/// One resource slot owned by the pool.
///
/// The value lives here while the slot is free or pending hand-off, and moves
/// into the [`PooledObject`] while lent.
pub(crate) struct Slot<T> {
    id: usize,
    created_at: SystemTime,
    value: Mutex<Option<T>>,
    total_acquired: AtomicU64,
    usage: Mutex<Usage>,
    recycled: AtomicBool,
}

impl<T> Slot<T> {
    /// A slot reserved by growth starts without a value.
    pub(crate) fn new(id: usize, value: Option<T>) -> Self {
        let now = SystemTime::now();
        Self {
            id,
            created_at: now,
            value: Mutex::new(value),
            total_acquired: AtomicU64::new(0),
            usage: Mutex::new(Usage {
                last_acquired_at: now,
                last_acquired_thread: None,
                last_recycled_at: now,
                last_recycled_thread: None,
            }),
            recycled: AtomicBool::new(false),
        }
    }

    pub(crate) fn id(&self) -> usize {
        self.id
    }

    pub(crate) fn take_value(&self) -> Option<T> {
        self.value.lock().take()
    }

    pub(crate) fn put_value(&self, value: Option<T>) {
        *self.value.lock() = value;
    }

    pub(crate) fn is_recycled(&self) -> bool {
        self.recycled.load(Ordering::Acquire)
    }

    pub(crate) fn set_recycled(&self, recycled: bool) {
        self.recycled.store(recycled, Ordering::Release);
    }

    pub(crate) fn mark_acquired(&self) {
        self.total_acquired.fetch_add(1, Ordering::Relaxed);
        let mut usage = self.usage.lock();
        usage.last_acquired_at = SystemTime::now();
        usage.last_acquired_thread = Some(thread::current().id());
    }

    pub(crate) fn mark_recycled(&self) {
        let mut usage = self.usage.lock();
        usage.last_recycled_at = SystemTime::now();
        usage.last_recycled_thread = Some(thread::current().id());
    }

    /// Whether the slot has been untouched for longer than `timeout`; a zero timeout never expires.
    pub(crate) fn is_idle(&self, timeout: Duration) -> bool {
        if timeout.is_zero() {
            return false;
        }
        let last = self.usage.lock().last_recycled_at;
        SystemTime::now()
            .duration_since(last)
            .is_ok_and(|idle| idle > timeout)
    }

    pub(crate) fn rewind_usage(&self, at: SystemTime) {
        let mut usage = self.usage.lock();
        usage.last_acquired_at = at;
        usage.last_recycled_at = at;
    }

    pub(crate) fn statistics(&self) -> HandleStatistics
    where
        T: fmt::Debug,
    {
        let usage = *self.usage.lock();
        HandleStatistics {
            id: self.id,
            value: self.value.lock().as_ref().map(|value| format!("{value:?}")),
            total_acquired: self.total_acquired.load(Ordering::Relaxed),
            created_at: self.created_at,
            last_acquired_at: usage.last_acquired_at,
            last_recycled_at: usage.last_recycled_at,
            last_acquired_thread: usage.last_acquired_thread.map(|id| format!("{id:?}")),
            last_recycled_thread: usage.last_recycled_thread.map(|id| format!("{id:?}")),
        }
    }
}

/// A pooled object that returns to the pool when dropped or released
///
/// # Examples
///
/// ```
/// use esox_resourcepool::{DefaultPolicy, ObjectPool, PoolConfiguration};
///
/// let pool = ObjectPool::new(DefaultPolicy::new(
///     PoolConfiguration::new().with_pool_size(1),
///     || String::from("conn"),
/// ))
/// .unwrap();
///
/// let mut obj = pool.acquire(None).unwrap().unwrap();
/// obj.push_str("-used");
/// assert_eq!(obj.id(), 0);
/// obj.release();
/// obj.release(); // no-op
///
/// assert_eq!(pool.statistics().free_objects, 1);
/// ```
pub struct PooledObject<T: Send + 'static> {
    slot: Option<Arc<Slot<T>>>,
    value: Option<T>,
    pool: Arc<PoolInner<T>>,
}

impl<T: Send + 'static> PooledObject<T> {
    /// Lease a slot; the value may be absent until the pool activates it.
    pub(crate) fn lease(slot: Arc<Slot<T>>, value: Option<T>, pool: Arc<PoolInner<T>>) -> Self {
        Self {
            slot: Some(slot),
            value,
            pool,
        }
    }

    pub(crate) fn has_value(&self) -> bool {
        self.value.is_some()
    }

    pub(crate) fn take_value(&mut self) -> Option<T> {
        self.value.take()
    }

    pub(crate) fn set_value(&mut self, value: T) {
        self.value = Some(value);
    }

    pub(crate) fn slot(&self) -> Option<&Arc<Slot<T>>> {
        self.slot.as_ref()
    }

    /// Disarm the guard and hand its parts back to the pool.
    pub(crate) fn into_parts(mut self) -> Option<(Arc<Slot<T>>, Option<T>)> {
        let slot = self.slot.take()?;
        Some((slot, self.value.take()))
    }

    pub(crate) fn mark_acquired(&self) {
        if let Some(slot) = &self.slot {
            slot.mark_acquired();
        }
    }

    /// Identity of the handle, stable for the lifetime of the pool
    pub fn id(&self) -> usize {
        self.slot.as_ref().map_or(usize::MAX, |slot| slot.id())
    }

    /// Number of times this handle has been acquired
    pub fn total_acquired(&self) -> u64 {
        self.slot
            .as_ref()
            .map_or(0, |slot| slot.total_acquired.load(Ordering::Relaxed))
    }

    pub fn created_at(&self) -> Option<SystemTime> {
        self.slot.as_ref().map(|slot| slot.created_at)
    }

    pub fn last_acquired_at(&self) -> Option<SystemTime> {
        self.slot.as_ref().map(|slot| slot.usage.lock().last_acquired_at)
    }

    pub fn last_recycled_at(&self) -> Option<SystemTime> {
        self.slot.as_ref().map(|slot| slot.usage.lock().last_recycled_at)
    }

    pub fn last_acquired_thread(&self) -> Option<ThreadId> {
        self.slot
            .as_ref()
            .and_then(|slot| slot.usage.lock().last_acquired_thread)
    }

    pub fn last_recycled_thread(&self) -> Option<ThreadId> {
        self.slot
            .as_ref()
            .and_then(|slot| slot.usage.lock().last_recycled_thread)
    }

    /// Whether the object is still lent to the caller
    pub fn is_held(&self) -> bool {
        self.slot.is_some()
    }

    /// Return the object to the pool. Calling it more than once is a no-op.
    pub fn release(&mut self) {
        self.release_inner(false);
    }

    /// Return the object to the pool after recreating its value.
    pub fn release_with_reset(&mut self) {
        self.release_inner(true);
    }

    pub(crate) fn release_inner(&mut self, reset: bool) {
        if let Some(slot) = self.slot.take() {
            let value = self.value.take();
            let pool = Arc::clone(&self.pool);
            pool.release_parts(slot, value, reset);
        }
    }
}

impl<T: Send + 'static> Deref for PooledObject<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.value.as_ref().expect("pooled object used after release")
    }
}

impl<T: Send + 'static> DerefMut for PooledObject<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.value.as_mut().expect("pooled object used after release")
    }
}

impl<T: Send + fmt::Debug + 'static> fmt::Debug for PooledObject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledObject")
            .field("id", &self.id())
            .field("value", &self.value)
            .finish()
    }
}

impl<T: Send + 'static> Drop for PooledObject<T> {
    fn drop(&mut self) {
        self.release_inner(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_detection() {
        let slot = Slot::new(3, Some("value"));
        assert!(!slot.is_idle(Duration::ZERO));
        assert!(!slot.is_idle(Duration::from_secs(60)));

        slot.rewind_usage(recovery_sentinel());
        assert!(slot.is_idle(Duration::from_secs(60)));

        slot.mark_recycled();
        assert!(!slot.is_idle(Duration::from_secs(60)));
    }

    #[test]
    fn test_value_cell() {
        let slot = Slot::new(0, None);
        assert_eq!(slot.take_value(), None);
        slot.put_value(Some(7));
        assert_eq!(slot.take_value(), Some(7));
        assert_eq!(slot.take_value(), None);
        slot.put_value(Some(8));
        assert_eq!(slot.take_value(), Some(8));
    }

    #[test]
    fn test_statistics_track_usage() {
        let slot = Slot::new(1, Some(42u32));
        slot.mark_acquired();
        slot.mark_acquired();

        let stats = slot.statistics();
        assert_eq!(stats.id, 1);
        assert_eq!(stats.total_acquired, 2);
        assert_eq!(stats.value.as_deref(), Some("42"));
        assert!(stats.last_acquired_thread.is_some());
        assert!(stats.last_recycled_thread.is_none());
    }
}
