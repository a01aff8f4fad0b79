use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use esox_resourcepool::{
    BoxError, DefaultPolicy, ObjectPool, Policy, PoolConfiguration, PoolError, PooledObject,
    async_trait,
};

/// Counts lifecycle calls so tests can observe the pool's behaviour.
#[derive(Default)]
struct Counters {
    created: AtomicUsize,
    destroyed: AtomicUsize,
    released: AtomicUsize,
    timeouts: AtomicUsize,
    creating: AtomicUsize,
    max_creating: AtomicUsize,
}

struct TrackingPolicy {
    config: PoolConfiguration,
    counters: Arc<Counters>,
    fail_acquire: AtomicBool,
    create_delay: Duration,
    release_delay: Duration,
}

impl TrackingPolicy {
    fn new(config: PoolConfiguration) -> (Self, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let policy = Self {
            config,
            counters: Arc::clone(&counters),
            fail_acquire: AtomicBool::new(false),
            create_delay: Duration::ZERO,
            release_delay: Duration::ZERO,
        };
        (policy, counters)
    }
}

#[async_trait]
impl Policy<usize> for TrackingPolicy {
    fn configuration(&self) -> &PoolConfiguration {
        &self.config
    }

    fn on_create(&self) -> Result<usize, BoxError> {
        let creating = self.counters.creating.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.max_creating.fetch_max(creating, Ordering::SeqCst);
        thread::sleep(self.create_delay);
        self.counters.creating.fetch_sub(1, Ordering::SeqCst);
        Ok(self.counters.created.fetch_add(1, Ordering::SeqCst))
    }

    fn on_destroy(&self, _value: usize) -> Result<(), BoxError> {
        self.counters.destroyed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn on_acquire(&self, _obj: &mut PooledObject<usize>) -> Result<(), BoxError> {
        if self.fail_acquire.load(Ordering::SeqCst) {
            return Err("handshake failed".into());
        }
        Ok(())
    }

    fn on_release(&self, _obj: &mut PooledObject<usize>) -> Result<(), BoxError> {
        thread::sleep(self.release_delay);
        self.counters.released.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn on_acquire_timeout(&self) {
        self.counters.timeouts.fetch_add(1, Ordering::SeqCst);
    }
}

fn config(size: usize) -> PoolConfiguration {
    PoolConfiguration::new()
        .with_name("tracking")
        .with_pool_size(size)
        .with_sync_timeout(Duration::from_millis(100))
}

fn tracking_pool(config: PoolConfiguration) -> (ObjectPool<usize>, Arc<Counters>) {
    let (policy, counters) = TrackingPolicy::new(config);
    (ObjectPool::new(policy).unwrap(), counters)
}

#[test]
fn test_concurrent_acquire_up_to_capacity() {
    const N: usize = 8;
    let (pool, counters) = tracking_pool(config(N).with_sync_timeout(Duration::ZERO));
    let barrier = Arc::new(Barrier::new(N));

    let workers: Vec<_> = (0..N)
        .map(|_| {
            let pool = pool.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                pool.acquire(None).unwrap().unwrap()
            })
        })
        .collect();
    let held: Vec<PooledObject<usize>> = workers.into_iter().map(|w| w.join().unwrap()).collect();

    let ids: HashSet<usize> = held.iter().map(|obj| obj.id()).collect();
    assert_eq!(ids.len(), N);
    assert_eq!(counters.created.load(Ordering::SeqCst), N);
    assert_eq!(pool.statistics().total_objects, N);
}

#[test]
fn test_full_pool_times_out_with_error() {
    let (pool, counters) = tracking_pool(config(1));
    let _held = pool.acquire(None).unwrap().unwrap();

    let started = Instant::now();
    let result = pool.acquire(Some(Duration::from_millis(80)));
    assert!(started.elapsed() >= Duration::from_millis(80));
    assert!(matches!(result, Err(PoolError::Timeout(t)) if t == Duration::from_millis(80)));
    assert_eq!(counters.timeouts.load(Ordering::SeqCst), 1);
}

#[test]
fn test_full_pool_times_out_with_none() {
    let (pool, counters) = tracking_pool(config(1).with_throw_on_timeout(false));
    let _held = pool.acquire(None).unwrap().unwrap();

    let started = Instant::now();
    assert!(pool.acquire(None).unwrap().is_none());
    assert!(started.elapsed() >= Duration::from_millis(100));
    assert_eq!(counters.timeouts.load(Ordering::SeqCst), 1);
}

#[test]
fn test_blocked_acquire_is_served_by_release() {
    let (pool, _) = tracking_pool(config(1).with_sync_timeout(Duration::from_secs(5)));
    let held = pool.acquire(None).unwrap().unwrap();
    let id = held.id();

    let waiter = {
        let pool = pool.clone();
        thread::spawn(move || pool.acquire(None).unwrap().unwrap().id())
    };
    while pool.statistics().sync_waiting == 0 {
        thread::sleep(Duration::from_millis(1));
    }
    drop(held);

    assert_eq!(waiter.join().unwrap(), id);
}

#[test]
fn test_sequential_cycles_reuse_handle() {
    let (pool, counters) = tracking_pool(config(1));
    let mut first = pool.acquire(None).unwrap().unwrap();
    let id = first.id();
    pool.release(&mut first, false);

    let second = pool.acquire(None).unwrap().unwrap();
    assert_eq!(second.id(), id);
    assert_eq!(counters.created.load(Ordering::SeqCst), 1);
}

#[test]
fn test_double_release_is_absorbed() {
    let (pool, counters) = tracking_pool(config(2));
    let mut obj = pool.acquire(None).unwrap().unwrap();
    pool.release(&mut obj, false);
    pool.release(&mut obj, false);
    obj.release();
    drop(obj);

    assert_eq!(pool.statistics().free_objects, 1);
    assert_eq!(counters.released.load(Ordering::SeqCst), 1);

    pool.dispose();
    assert_eq!(counters.destroyed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_no_handle_is_shared_under_contention() {
    const THREADS: usize = 8;
    const ROUNDS: usize = 300;

    let policy = DefaultPolicy::new(
        PoolConfiguration::new()
            .with_pool_size(3)
            .with_sync_timeout(Duration::from_secs(10)),
        || Arc::new(AtomicBool::new(false)),
    );
    let pool = ObjectPool::new(policy).unwrap();

    let workers: Vec<_> = (0..THREADS)
        .map(|_| {
            let pool = pool.clone();
            thread::spawn(move || {
                for _ in 0..ROUNDS {
                    let obj = pool.acquire(None).unwrap().unwrap();
                    assert!(!obj.swap(true, Ordering::SeqCst), "handle lent twice");
                    thread::yield_now();
                    obj.store(false, Ordering::SeqCst);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let stats = pool.statistics();
    assert_eq!(stats.total_objects, 3);
    assert_eq!(stats.free_objects, 3);
}

#[test]
fn test_idle_value_is_recreated() {
    let (pool, counters) = tracking_pool(config(1).with_idle_timeout(Duration::from_millis(150)));
    drop(pool.acquire(None).unwrap());

    // still fresh
    drop(pool.acquire(None).unwrap());
    assert_eq!(counters.created.load(Ordering::SeqCst), 1);

    thread::sleep(Duration::from_millis(250));
    let obj = pool.acquire(None).unwrap().unwrap();
    assert_eq!(*obj, 1);
    assert_eq!(counters.destroyed.load(Ordering::SeqCst), 1);
    assert_eq!(counters.created.load(Ordering::SeqCst), 2);
}

#[test]
fn test_acquire_hook_failure_returns_handle() {
    let (policy, _) = TrackingPolicy::new(config(1));
    policy.fail_acquire.store(true, Ordering::SeqCst);
    let pool = ObjectPool::new(policy).unwrap();

    let result = pool.acquire(None);
    assert!(matches!(result, Err(PoolError::Hook { hook: "on_acquire", .. })));
    assert_eq!(pool.statistics().free_objects, 1);
    assert_eq!(pool.statistics().total_objects, 1);
}

#[test]
fn test_create_failure_propagates() {
    let pool: ObjectPool<u8> = ObjectPool::new(DefaultPolicy::fallible(PoolConfiguration::new(), || {
        Err("database is down".into())
    }))
    .unwrap();

    let err = pool.acquire(None).unwrap_err();
    assert!(matches!(err, PoolError::Hook { hook: "on_create", .. }));
    assert!(err.to_string().contains("database is down"));

    // the reserved handle goes back empty and is retried, not leaked
    let stats = pool.statistics();
    assert_eq!(stats.total_objects, 1);
    assert_eq!(stats.free_objects, 1);
    assert!(pool.acquire(None).is_err());
    assert_eq!(pool.statistics().total_objects, 1);
}

#[test]
fn test_values_are_created_outside_growth_lock() {
    const N: usize = 4;
    let (mut policy, counters) = TrackingPolicy::new(config(N));
    policy.create_delay = Duration::from_millis(100);
    let pool = ObjectPool::new(policy).unwrap();
    let barrier = Arc::new(Barrier::new(N));

    let workers: Vec<_> = (0..N)
        .map(|_| {
            let pool = pool.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                pool.acquire(None).unwrap().unwrap()
            })
        })
        .collect();
    let held: Vec<PooledObject<usize>> = workers.into_iter().map(|w| w.join().unwrap()).collect();

    assert_eq!(held.len(), N);
    assert_eq!(counters.created.load(Ordering::SeqCst), N);
    assert!(counters.max_creating.load(Ordering::SeqCst) > 1);
}

#[test]
fn test_acquire_during_slow_release_is_served() {
    let (mut policy, _) = TrackingPolicy::new(config(1).with_sync_timeout(Duration::from_secs(2)));
    policy.release_delay = Duration::from_millis(200);
    let pool = ObjectPool::new(policy).unwrap();
    let held = pool.acquire(None).unwrap().unwrap();

    let releaser = thread::spawn(move || drop(held));
    thread::sleep(Duration::from_millis(50));

    // queues while the release is still inside `on_release`
    let started = Instant::now();
    let obj = pool.acquire(None).unwrap();
    assert!(obj.is_some());
    assert!(started.elapsed() < Duration::from_secs(1));
    releaser.join().unwrap();

    drop(obj);
    let stats = pool.statistics();
    assert_eq!(stats.free_objects, 1);
    assert_eq!(stats.sync_waiting, 0);
}

#[test]
fn test_dispose_destroys_instead_of_pooling() {
    let (pool, counters) = tracking_pool(config(2));
    let idle = pool.acquire(None).unwrap().unwrap();
    let lent = pool.acquire(None).unwrap().unwrap();
    drop(idle);

    pool.dispose();
    assert_eq!(counters.destroyed.load(Ordering::SeqCst), 1);
    assert_eq!(pool.statistics().total_objects, 0);

    drop(lent);
    assert_eq!(counters.destroyed.load(Ordering::SeqCst), 2);
    assert_eq!(pool.statistics().free_objects, 0);
    assert!(matches!(pool.acquire(None), Err(PoolError::Disposed(_))));

    // idempotent
    pool.dispose();
    assert_eq!(counters.destroyed.load(Ordering::SeqCst), 2);
}

#[test]
fn test_dispose_unblocks_sync_waiter() {
    let (pool, _) = tracking_pool(config(1).with_sync_timeout(Duration::from_secs(30)));
    let _held = pool.acquire(None).unwrap().unwrap();

    let waiter = {
        let pool = pool.clone();
        thread::spawn(move || {
            let started = Instant::now();
            let result = pool.acquire(None);
            (started.elapsed(), matches!(result, Err(PoolError::Disposed(_))))
        })
    };
    while pool.statistics().sync_waiting == 0 {
        thread::sleep(Duration::from_millis(1));
    }
    pool.dispose();

    let (waited, disposed) = waiter.join().unwrap();
    assert!(disposed);
    assert!(waited < Duration::from_secs(30));
}

#[test]
fn test_dropping_last_clone_disposes() {
    let (pool, counters) = tracking_pool(config(2));
    drop(pool.acquire(None).unwrap());
    drop(pool);
    assert_eq!(counters.destroyed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_full_statistics_lists_handles() {
    let (pool, _) = tracking_pool(config(3));
    let lent = pool.acquire(None).unwrap().unwrap();
    drop(pool.acquire(None).unwrap());

    let full = pool.statistics_full();
    assert_eq!(full.pool_name, "tracking");
    assert_eq!(full.handles.len(), 2);
    let lent_stats = full.handles.iter().find(|h| h.id == lent.id()).unwrap();
    assert!(lent_stats.value.is_none());
    assert_eq!(lent_stats.total_acquired, 1);
    assert!(full.unavailable.is_none());
}

#[tokio::test]
async fn test_async_queue_rejects_past_capacity() {
    let (pool, _) = tracking_pool(config(1).with_async_capacity(2));
    let _held = pool.acquire_async().await.unwrap();

    let queued = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.acquire_async().await.map(|obj| obj.id()) })
    };
    while pool.statistics().async_waiting == 0 {
        tokio::task::yield_now().await;
    }

    let rejected = pool.acquire_async().await;
    assert!(matches!(rejected, Err(PoolError::QueueFull(2))));
    assert_eq!(pool.statistics().async_waiting, 1);

    pool.dispose();
    assert!(matches!(queued.await.unwrap(), Err(PoolError::Disposed(_))));
}

#[tokio::test]
async fn test_fifo_across_sync_and_async_waiters() {
    let (pool, _) = tracking_pool(config(1).with_sync_timeout(Duration::from_secs(5)));
    let order = Arc::new(Mutex::new(Vec::new()));
    let held = pool.acquire(None).unwrap().unwrap();

    let sync_waiter = {
        let pool = pool.clone();
        let order = Arc::clone(&order);
        thread::spawn(move || {
            let obj = pool.acquire(None).unwrap().unwrap();
            order.lock().unwrap().push("sync");
            thread::sleep(Duration::from_millis(30));
            drop(obj);
        })
    };
    while pool.statistics().sync_waiting == 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    let async_waiter = {
        let pool = pool.clone();
        let order = Arc::clone(&order);
        tokio::spawn(async move {
            let _obj = pool.acquire_async().await.unwrap();
            order.lock().unwrap().push("async");
        })
    };
    while pool.statistics().async_waiting == 0 {
        tokio::task::yield_now().await;
    }

    drop(held);
    async_waiter.await.unwrap();
    sync_waiter.join().unwrap();

    assert_eq!(*order.lock().unwrap(), vec!["sync", "async"]);
}

#[tokio::test]
async fn test_cancelled_async_waiter_does_not_lose_handle() {
    let (pool, _) = tracking_pool(config(1));
    let held = pool.acquire_async().await.unwrap();

    let abandoned = tokio::time::timeout(Duration::from_millis(20), pool.acquire_async()).await;
    assert!(abandoned.is_err());
    assert_eq!(pool.statistics().async_waiting, 0);

    drop(held);
    let stats = pool.statistics();
    assert_eq!(stats.free_objects, 1);
    assert_eq!(stats.async_waiting, 0);
    assert!(pool.acquire_async().await.is_ok());
}

#[tokio::test]
async fn test_cancelled_async_waiter_frees_queue_capacity() {
    let (pool, _) = tracking_pool(config(1).with_async_capacity(2));
    let held = pool.acquire_async().await.unwrap();
    let id = held.id();

    let abandoned = tokio::time::timeout(Duration::from_millis(10), pool.acquire_async()).await;
    assert!(abandoned.is_err());

    let queued = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.acquire_async().await.map(|obj| obj.id()) })
    };
    while pool.statistics().async_waiting == 0 && !queued.is_finished() {
        tokio::task::yield_now().await;
    }
    assert_eq!(pool.statistics().async_waiting, 1);

    drop(held);
    assert_eq!(queued.await.unwrap().unwrap(), id);
}
