//! Basic usage examples for ObjectPool

use esox_resourcepool::{DefaultPolicy, ObjectPool, PoolConfiguration};
use std::time::Duration;

#[derive(Debug)]
struct Connection {
    id: usize,
}

fn main() {
    tracing_subscriber::fmt().with_env_filter("esox_resourcepool=debug").init();

    println!("=== Esox ResourcePool - Basic Examples ===\n");

    // Example 1: Simple pool
    simple_pool();

    // Example 2: Timeouts on an exhausted pool
    exhausted_pool();

    // Example 3: Try methods
    try_methods();

    // Example 4: Statistics
    statistics();
}

fn connection_pool(size: usize) -> ObjectPool<Connection> {
    let next_id = std::sync::atomic::AtomicUsize::new(1);
    let policy = DefaultPolicy::new(
        PoolConfiguration::new()
            .with_name("connections")
            .with_pool_size(size)
            .with_sync_timeout(Duration::from_millis(200)),
        move || Connection {
            id: next_id.fetch_add(1, std::sync::atomic::Ordering::Relaxed),
        },
    );
    ObjectPool::new(policy).unwrap()
}

fn simple_pool() {
    println!("1. Simple Pool:");
    let pool = connection_pool(3);

    {
        let conn = pool.acquire(None).unwrap().unwrap();
        println!("   Got connection: {}", conn.id);
        // Connection automatically returned when dropped
    }

    println!("   Free after return: {}\n", pool.statistics().free_objects);
}

fn exhausted_pool() {
    println!("2. Exhausted Pool:");
    let pool = connection_pool(1);

    let _held = pool.acquire(None).unwrap();
    match pool.acquire(Some(Duration::from_millis(50))) {
        Ok(_) => println!("   Got connection"),
        Err(e) => println!("   Error: {}", e),
    }
    println!();
}

fn try_methods() {
    println!("3. Try Methods:");
    let pool = connection_pool(1);

    let conn1 = pool.try_acquire().unwrap();
    assert!(conn1.is_some());
    println!("   First try: Success");

    let conn2 = pool.try_acquire().unwrap();
    assert!(conn2.is_none());
    println!("   Second try: None (pool exhausted)");

    drop(conn1);

    let conn3 = pool.try_acquire().unwrap();
    assert!(conn3.is_some());
    println!("   Third try: Success\n");
}

fn statistics() {
    println!("4. Statistics:");
    let pool = connection_pool(5);

    {
        let _conn1 = pool.acquire(None).unwrap();
        let _conn2 = pool.acquire(None).unwrap();
        println!("   {}", pool.statistics());
    }

    println!("\n   Exported:");
    for (key, value) in pool.statistics().export() {
        println!("     {}: {}", key, value);
    }

    println!("\n   Full:\n{}", pool.statistics_full());
    pool.dispose();
}
