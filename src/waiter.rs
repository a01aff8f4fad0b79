//! Waiter entries for acquisitions that found the pool exhausted
//!
//! Sync and async waiters share one FIFO queue, so a release always serves
//! the oldest live waiter regardless of its kind.

use std::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering, fence};
use std::time::{Duration, Instant};

use crossbeam::queue::SegQueue;
use parking_lot::{Condvar, Mutex};
use tokio::sync::oneshot;

use crate::handle::PooledObject;

enum SyncState<T: Send + 'static> {
    Waiting,
    Delivered(PooledObject<T>),
    TimedOut,
    Closed,
}

pub(crate) enum WaitOutcome<T: Send + 'static> {
    Delivered(PooledObject<T>),
    TimedOut,
    Closed,
}

/// A blocked synchronous acquirer.
///
/// Delivery and timeout are decided under the entry's own lock: a releaser
/// either hands the object over while the entry is still waiting, or gets it
/// back and moves on.
pub(crate) struct SyncWaiter<T: Send + 'static> {
    state: Mutex<SyncState<T>>,
    ready: Condvar,
}

impl<T: Send + 'static> SyncWaiter<T> {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(SyncState::Waiting),
            ready: Condvar::new(),
        }
    }

    fn deliver(&self, obj: PooledObject<T>) -> Result<(), PooledObject<T>> {
        let mut state = self.state.lock();
        if !matches!(*state, SyncState::Waiting) {
            return Err(obj);
        }
        *state = SyncState::Delivered(obj);
        self.ready.notify_one();
        Ok(())
    }

    fn close(&self) {
        let mut state = self.state.lock();
        if matches!(*state, SyncState::Waiting) {
            *state = SyncState::Closed;
        }
        self.ready.notify_all();
    }

    /// Give up on the entry, returning anything that was delivered meanwhile.
    pub(crate) fn abandon(&self) -> Option<PooledObject<T>> {
        let mut state = self.state.lock();
        match mem::replace(&mut *state, SyncState::TimedOut) {
            SyncState::Delivered(obj) => Some(obj),
            _ => None,
        }
    }

    /// Block until delivery, closure or `timeout`.
    pub(crate) fn wait(&self, timeout: Duration) -> WaitOutcome<T> {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.state.lock();
        while matches!(*state, SyncState::Waiting) {
            match deadline {
                Some(deadline) => {
                    if self.ready.wait_until(&mut state, deadline).timed_out()
                        && matches!(*state, SyncState::Waiting)
                    {
                        *state = SyncState::TimedOut;
                        return WaitOutcome::TimedOut;
                    }
                }
                None => self.ready.wait(&mut state),
            }
        }
        match mem::replace(&mut *state, SyncState::TimedOut) {
            SyncState::Delivered(obj) => WaitOutcome::Delivered(obj),
            SyncState::Closed => WaitOutcome::Closed,
            _ => WaitOutcome::TimedOut,
        }
    }
}

enum Waiter<T: Send + 'static> {
    Sync(Arc<SyncWaiter<T>>),
    Async(oneshot::Sender<PooledObject<T>>),
}

struct Entry<T: Send + 'static> {
    waiter: Waiter<T>,
    live: Arc<AtomicBool>,
}

/// Keeps a queued waiter counted until a release pops it or its owner gives up.
///
/// Once the acquirer stops waiting for any reason, dropping the ticket
/// uncounts its entry right away. The entry itself stays queued until the
/// next release or dispose skips it.
pub(crate) struct Ticket<'a> {
    waiting: &'a AtomicUsize,
    live: Arc<AtomicBool>,
}

impl Drop for Ticket<'_> {
    fn drop(&mut self) {
        if self.live.swap(false, Ordering::AcqRel) {
            self.waiting.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

/// Arrival-ordered queue of sync and async waiters.
///
/// Counts cover live waiters only; abandoned entries stay queued until a
/// release or dispose drains them.
pub(crate) struct WaitQueue<T: Send + 'static> {
    entries: SegQueue<Entry<T>>,
    sync_waiting: AtomicUsize,
    async_waiting: AtomicUsize,
}

impl<T: Send + 'static> WaitQueue<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: SegQueue::new(),
            sync_waiting: AtomicUsize::new(0),
            async_waiting: AtomicUsize::new(0),
        }
    }

    pub(crate) fn sync_len(&self) -> usize {
        self.sync_waiting.load(Ordering::SeqCst)
    }

    pub(crate) fn async_len(&self) -> usize {
        self.async_waiting.load(Ordering::SeqCst)
    }

    /// Whether any entry, live or abandoned, is still queued
    pub(crate) fn is_empty(&self) -> bool {
        fence(Ordering::SeqCst);
        self.entries.is_empty()
    }

    pub(crate) fn push_sync(&self, waiter: Arc<SyncWaiter<T>>) -> Ticket<'_> {
        self.push(Waiter::Sync(waiter), &self.sync_waiting)
    }

    pub(crate) fn push_async(&self, sender: oneshot::Sender<PooledObject<T>>) -> Ticket<'_> {
        self.push(Waiter::Async(sender), &self.async_waiting)
    }

    fn push<'a>(&'a self, waiter: Waiter<T>, waiting: &'a AtomicUsize) -> Ticket<'a> {
        let live = Arc::new(AtomicBool::new(true));
        waiting.fetch_add(1, Ordering::SeqCst);
        self.entries.push(Entry {
            waiter,
            live: Arc::clone(&live),
        });
        // pairs with the fence in `is_empty` so a concurrent release sees this entry
        fence(Ordering::SeqCst);
        Ticket { waiting, live }
    }

    fn pop(&self) -> Option<Waiter<T>> {
        let entry = self.entries.pop()?;
        if entry.live.swap(false, Ordering::AcqRel) {
            match &entry.waiter {
                Waiter::Sync(_) => self.sync_waiting.fetch_sub(1, Ordering::SeqCst),
                Waiter::Async(_) => self.async_waiting.fetch_sub(1, Ordering::SeqCst),
            };
        }
        Some(entry.waiter)
    }

    /// Offer `obj` to waiters in arrival order, skipping abandoned entries.
    ///
    /// Returns the object back when no waiter took it.
    pub(crate) fn hand_off(&self, mut obj: PooledObject<T>) -> Option<PooledObject<T>> {
        while let Some(waiter) = self.pop() {
            let result = match waiter {
                Waiter::Sync(waiter) => waiter.deliver(obj),
                Waiter::Async(sender) => sender.send(obj),
            };
            match result {
                Ok(()) => return None,
                Err(returned) => obj = returned,
            }
        }
        Some(obj)
    }

    /// Wake every sync waiter with a closed outcome and cancel every async waiter.
    pub(crate) fn close_all(&self) {
        while let Some(waiter) = self.pop() {
            match waiter {
                Waiter::Sync(waiter) => waiter.close(),
                Waiter::Async(sender) => drop(sender),
            }
        }
    }
}
