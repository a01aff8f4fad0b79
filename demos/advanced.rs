//! Advanced features: availability recovery, idle revalidation, registry, metrics

use esox_resourcepool::{
    BoxError, DefaultPolicy, DynPool, ObjectPool, Policy, PoolConfiguration, PoolMetrics,
    PoolRegistry, PooledObject, async_trait,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
struct Connection {
    data: String,
}

/// Backend whose health the demo can toggle
struct Backend {
    config: PoolConfiguration,
    up: Arc<AtomicBool>,
}

#[async_trait]
impl Policy<Connection> for Backend {
    fn configuration(&self) -> &PoolConfiguration {
        &self.config
    }

    fn on_create(&self) -> Result<Connection, BoxError> {
        Ok(Connection {
            data: "primary".to_string(),
        })
    }

    fn on_check_available(&self, _obj: &mut PooledObject<Connection>) -> Result<bool, BoxError> {
        Ok(self.up.load(Ordering::SeqCst))
    }

    fn on_available(&self) {
        println!("   -> backend recovered");
    }

    fn on_unavailable(&self) {
        println!("   -> backend marked unavailable");
    }
}

fn main() {
    println!("=== Esox ResourcePool - Advanced Features ===\n");

    // Example 1: Availability and recovery
    availability_recovery();

    // Example 2: Idle revalidation
    idle_revalidation();

    // Example 3: Registry
    registry();

    // Example 4: Prometheus metrics
    prometheus_export();
}

fn availability_recovery() {
    println!("1. Availability Recovery:");

    let up = Arc::new(AtomicBool::new(false));
    let pool = ObjectPool::new(Backend {
        config: PoolConfiguration::new()
            .with_name("primary")
            .with_pool_size(2)
            .with_check_interval(Duration::from_millis(100)),
        up: Arc::clone(&up),
    })
    .unwrap();

    pool.set_unavailable("connection reset by peer");
    match pool.acquire(None) {
        Ok(_) => println!("   Got connection"),
        Err(e) => println!("   Error: {}", e),
    }

    up.store(true, Ordering::SeqCst);
    while !pool.is_available() {
        thread::sleep(Duration::from_millis(20));
    }
    let conn = pool.acquire(None).unwrap().unwrap();
    println!("   Connected to {}", conn.data);
    println!();
}

fn idle_revalidation() {
    println!("2. Idle Revalidation:");

    let config = PoolConfiguration::new()
        .with_pool_size(1)
        .with_idle_timeout(Duration::from_millis(100));
    let pool = ObjectPool::new(DefaultPolicy::new(config, || {
        println!("   Creating value...");
        std::time::Instant::now()
    }))
    .unwrap();

    drop(pool.acquire(None).unwrap());
    thread::sleep(Duration::from_millis(150));
    drop(pool.acquire(None).unwrap()); // value recreated here
    println!();
}

fn registry() {
    println!("3. Registry:");

    let registry = PoolRegistry::new();
    registry
        .create(DefaultPolicy::new(
            PoolConfiguration::new().with_name("cache").with_pool_size(4),
            || Vec::<u8>::with_capacity(1024),
        ))
        .unwrap();

    let pool = registry.get::<Vec<u8>>("cache").unwrap();
    {
        let buf = pool.acquire(None).unwrap().unwrap();
        println!("   Buffer capacity: {}", buf.capacity());
    }

    let erased = registry
        .get_dyn(std::any::TypeId::of::<Vec<u8>>(), "cache")
        .unwrap();
    println!("   {} ({}): {}", erased.name(), erased.type_name(), erased.statistics());

    registry.dispose_all();
    println!();
}

fn prometheus_export() {
    println!("4. Prometheus Metrics:");

    let registry = prometheus::Registry::new();
    let metrics = PoolMetrics::register(&registry).unwrap();

    let pool = ObjectPool::new(DefaultPolicy::new(
        PoolConfiguration::new().with_name("my_pool"),
        || 1,
    ))
    .unwrap();
    let _obj = pool.acquire(None).unwrap();
    metrics.record(pool.name(), &pool.statistics());

    let mut buffer = Vec::new();
    let encoder = prometheus::TextEncoder::new();
    prometheus::Encoder::encode(&encoder, &registry.gather(), &mut buffer).unwrap();
    println!("{}", String::from_utf8_lossy(&buffer));
}
