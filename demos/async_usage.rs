//! Async usage examples

use esox_resourcepool::{
    BoxError, DefaultPolicy, ObjectPool, Policy, PoolConfiguration, PooledObject, async_trait,
};
use std::time::Duration;
use tokio::time::sleep;

/// Policy with an async pre-use hook, e.g. a ping before handing a session out
struct SessionPolicy {
    config: PoolConfiguration,
}

#[async_trait]
impl Policy<String> for SessionPolicy {
    fn configuration(&self) -> &PoolConfiguration {
        &self.config
    }

    fn on_create(&self) -> Result<String, BoxError> {
        println!("   Opening session...");
        Ok(String::from("session"))
    }

    async fn on_acquire_async(&self, obj: &mut PooledObject<String>) -> Result<(), BoxError> {
        sleep(Duration::from_millis(5)).await;
        println!("   Pinged session #{}", obj.id());
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    println!("=== Esox ResourcePool - Async Examples ===\n");

    // Example 1: Async acquire
    async_acquire().await;

    // Example 2: Backpressure
    backpressure().await;

    // Example 3: Concurrent access
    concurrent_access().await;
}

async fn async_acquire() {
    println!("1. Async Acquire:");
    let pool = ObjectPool::new(SessionPolicy {
        config: PoolConfiguration::new().with_name("sessions").with_pool_size(2),
    })
    .unwrap();

    {
        let session = pool.acquire_async().await.unwrap();
        println!("   Got {} asynchronously", *session);
    }

    println!();
}

async fn backpressure() {
    println!("2. Backpressure:");

    let pool = ObjectPool::new(DefaultPolicy::new(
        PoolConfiguration::new().with_pool_size(1).with_async_capacity(2),
        || 42,
    ))
    .unwrap();

    let held = pool.acquire_async().await.unwrap();

    let queued = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.acquire_async().await.map(|obj| *obj) })
    };
    while pool.statistics().async_waiting == 0 {
        tokio::task::yield_now().await;
    }

    match pool.acquire_async().await {
        Ok(_) => println!("   Got object"),
        Err(e) => println!("   Error: {}", e),
    }

    drop(held);
    println!("   Queued caller got: {:?}", queued.await.unwrap());
    println!();
}

async fn concurrent_access() {
    println!("3. Concurrent Access:");

    let pool = ObjectPool::new(DefaultPolicy::new(
        PoolConfiguration::new().with_pool_size(3),
        || 7,
    ))
    .unwrap();

    let mut handles = vec![];

    for i in 0..10 {
        let pool = pool.clone();
        let handle = tokio::spawn(async move {
            match pool.acquire_async().await {
                Ok(obj) => {
                    println!("   Task {} got object #{}", i, obj.id());
                    sleep(Duration::from_millis(50)).await;
                }
                Err(e) => println!("   Task {} couldn't get object: {}", i, e),
            }
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.await.unwrap();
    }

    println!("   Final: {}", pool.statistics());
}
