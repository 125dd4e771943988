//! Basic usage examples for ResizablePool

use esox_resizable_pool::{ManualClock, PoolConfiguration, ResizablePool, TeardownFn};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .init();

    println!("=== Esox Resizable Pool - Basic Examples ===\n");

    // Example 1: Rent and return
    rent_and_return();

    // Example 2: Resizing while objects are rented
    resizing();

    // Example 3: Shrinking by age
    shrinking();

    // Example 4: Metrics and health
    metrics_and_health();
}

fn buffer_pool(max: usize) -> ResizablePool<Vec<u8>> {
    ResizablePool::new(|| Vec::with_capacity(256), PoolConfiguration::new().with_max_pool_size(max))
        .with_reset(|buf: &Vec<u8>| {
            if buf.capacity() >= 256 { Ok(()) } else { Err("buffer lost its capacity") }
        })
        .with_teardown(TeardownFn::new(|buf: Arc<Vec<u8>>| {
            println!("   destroying buffer of capacity {}", buf.capacity());
            Ok::<(), std::io::Error>(())
        }))
}

fn rent_and_return() {
    println!("1. Rent and Return:");
    let pool = buffer_pool(2);

    let first = pool.rent().unwrap();
    let second = pool.rent().unwrap();
    println!("   Rented: {}, full: {}", pool.rented_count(), pool.try_rent().unwrap().is_none());

    pool.return_object(first).unwrap();
    pool.return_object(second).unwrap();
    println!("   Available after return: {}\n", pool.available_count());
}

fn resizing() {
    println!("2. Resizing:");
    let pool = buffer_pool(4);
    let held: Vec<_> = (0..4).map(|_| pool.rent().unwrap()).collect();

    pool.resize(2).unwrap();
    println!("   After resize(2): owned {}, pending deletion {}", pool.current_pool_size(), pool.pending_deletion_count());

    for buf in held {
        pool.return_object(buf).unwrap();
    }
    println!("   After returns: owned {}, available {}\n", pool.current_pool_size(), pool.available_count());
}

fn shrinking() {
    println!("3. Shrinking by Age:");
    let clock = Arc::new(ManualClock::new());
    let pool = buffer_pool(3).with_clock(clock.clone());

    let buf = pool.rent().unwrap();
    pool.return_object(buf).unwrap();
    clock.advance(Duration::from_secs(120));

    let owned = pool.shrink(Duration::from_secs(60)).unwrap();
    println!("   Owned after shrink: {}\n", owned);
}

fn metrics_and_health() {
    println!("4. Metrics and Health:");
    let pool = buffer_pool(5);
    let _a = pool.rent().unwrap();
    let _b = pool.rent().unwrap();

    let health = pool.get_health_status();
    println!("   Health: {}", if health.is_healthy { "Healthy" } else { "Unhealthy" });
    println!("   Utilization: {:.1}%", health.utilization * 100.0);

    println!("\n{}", pool.export_metrics_prometheus("buffers", None));
}
