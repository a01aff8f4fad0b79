//! Availability state machine with background recovery
//!
//! A pool starts `Available`. [`ObjectPool::set_unavailable`](crate::ObjectPool::set_unavailable)
//! opens the circuit: ordinary acquisitions fail fast with the stored error
//! while a single background task probes the pool every
//! `check_available_interval` until a probe passes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime};

use parking_lot::{Condvar, Mutex};

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::errors::{BoxError, PoolError, PoolResult, SharedError};
use crate::handle::recovery_sentinel;
use crate::pool::PoolInner;

/// Availability of a pool
///
/// # Examples
///
/// ```
/// use esox_resourcepool::{AvailabilityState, DefaultPolicy, ObjectPool, PoolConfiguration};
///
/// let pool = ObjectPool::new(DefaultPolicy::new(PoolConfiguration::new(), || 1)).unwrap();
/// assert_eq!(pool.availability_state(), AvailabilityState::Available);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum AvailabilityState {
    Available,
    Unavailable,
}

struct Outage {
    error: SharedError,
    since: SystemTime,
}

/// Cancellable sleep shared between the pool and its recovery thread.
#[derive(Default)]
struct StopSignal {
    stopped: Mutex<bool>,
    wake: Condvar,
}

impl StopSignal {
    /// Sleep for `interval`; returns `true` if stopped meanwhile.
    fn sleep(&self, interval: Duration) -> bool {
        let deadline = Instant::now().checked_add(interval);
        let mut stopped = self.stopped.lock();
        while !*stopped {
            match deadline {
                Some(deadline) => {
                    if self.wake.wait_until(&mut stopped, deadline).timed_out() {
                        break;
                    }
                }
                None => self.wake.wait(&mut stopped),
            }
        }
        *stopped
    }

    fn stop(&self) {
        *self.stopped.lock() = true;
        self.wake.notify_all();
    }
}

struct RecoveryTask {
    stop: Arc<StopSignal>,
    handle: JoinHandle<()>,
}

pub(crate) struct Availability {
    unavailable: AtomicBool,
    outage: Mutex<Option<Outage>>,
    recovery: Mutex<Option<RecoveryTask>>,
}

impl Availability {
    pub(crate) fn new() -> Self {
        Self {
            unavailable: AtomicBool::new(false),
            outage: Mutex::new(None),
            recovery: Mutex::new(None),
        }
    }

    /// Stored error message while unavailable.
    pub(crate) fn reason(&self) -> Option<String> {
        if !self.unavailable.load(Ordering::Acquire) {
            return None;
        }
        self.outage.lock().as_ref().map(|outage| outage.error.to_string())
    }

    pub(crate) fn state(&self) -> AvailabilityState {
        if self.unavailable.load(Ordering::Acquire) {
            AvailabilityState::Unavailable
        } else {
            AvailabilityState::Available
        }
    }

    pub(crate) fn error(&self) -> Option<SharedError> {
        self.outage.lock().as_ref().map(|outage| Arc::clone(&outage.error))
    }

    pub(crate) fn since(&self) -> Option<SystemTime> {
        self.outage.lock().as_ref().map(|outage| outage.since)
    }
}

impl<T: Send + 'static> PoolInner<T> {
    pub(crate) fn set_unavailable(self: &Arc<Self>, error: BoxError) -> bool {
        let error: SharedError = Arc::from(error);
        {
            let mut outage = self.availability.outage.lock();
            if outage.is_some() {
                return false;
            }
            *outage = Some(Outage {
                error: Arc::clone(&error),
                since: SystemTime::now(),
            });
            self.availability.unavailable.store(true, Ordering::Release);
        }

        tracing::warn!(pool = %self.name, %error, "pool became unavailable");
        self.policy.on_unavailable();
        self.spawn_recovery();
        true
    }

    fn spawn_recovery(self: &Arc<Self>) {
        if !self.is_running() {
            return;
        }
        let interval = self.config().check_available_interval;
        let stop = Arc::new(StopSignal::default());
        let pool = Arc::downgrade(self);
        let signal = Arc::clone(&stop);

        let spawned = thread::Builder::new()
            .name(format!("{}-recovery", self.name))
            .spawn(move || recovery_loop(pool, signal, interval));

        match spawned {
            Ok(handle) => {
                tracing::info!(pool = %self.name, ?interval, "scheduled availability checks");
                let previous = self
                    .availability
                    .recovery
                    .lock()
                    .replace(RecoveryTask { stop, handle });
                if let Some(previous) = previous {
                    previous.stop.stop();
                }
            }
            Err(error) => {
                tracing::error!(pool = %self.name, %error, "failed to start recovery task");
            }
        }
    }

    pub(crate) fn stop_recovery(&self) {
        let Some(task) = self.availability.recovery.lock().take() else {
            return;
        };
        task.stop.stop();
        // dispose may run on the recovery thread itself
        if task.handle.thread().id() != thread::current().id() && task.handle.join().is_err() {
            tracing::warn!(pool = %self.name, "recovery task panicked");
        }
    }

    /// Borrow one handle, bypassing the availability gate, and run the health probe on it.
    fn probe(self: &Arc<Self>) -> PoolResult<()> {
        let Some(mut obj) = self.get_or_create_free(false)? else {
            return Err(PoolError::PoolEmpty);
        };
        let healthy = self.policy.on_check_available(&mut obj);
        obj.release();
        match healthy {
            Ok(true) => Ok(()),
            Ok(false) => Err(PoolError::CheckFailed),
            Err(error) => Err(PoolError::hook("on_check_available", error)),
        }
    }

    pub(crate) fn live_check_available(self: &Arc<Self>) -> bool {
        match self.probe() {
            Ok(()) => {
                self.restore_to_available();
                true
            }
            Err(error) => {
                tracing::debug!(pool = %self.name, %error, "live availability check failed");
                false
            }
        }
    }

    fn restore_to_available(&self) {
        let restored = {
            let mut outage = self.availability.outage.lock();
            self.availability.unavailable.store(false, Ordering::Release);
            outage.take().is_some()
        };
        if !restored {
            return;
        }

        let sentinel = recovery_sentinel();
        for slot in self.all.lock().iter() {
            slot.rewind_usage(sentinel);
        }
        self.policy.on_available();
        tracing::info!(pool = %self.name, "pool recovered");
    }
}

fn recovery_loop<T: Send + 'static>(pool: Weak<PoolInner<T>>, stop: Arc<StopSignal>, interval: Duration) {
    loop {
        if stop.sleep(interval) {
            return;
        }
        let Some(pool) = pool.upgrade() else {
            return;
        };
        if !pool.is_running() || pool.availability.reason().is_none() {
            return;
        }
        match pool.probe() {
            Ok(()) => {
                pool.restore_to_available();
                return;
            }
            Err(error) => {
                tracing::warn!(pool = %pool.name, %error, next_check_in = ?interval, "pool still unavailable");
            }
        }
    }
}
