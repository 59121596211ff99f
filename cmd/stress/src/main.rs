//! Stress test - many tasks
//!
//! Spawns a large number of tasks that yield and pass a token through a
//! shared channel, then joins them all.
//!
//! Usage: stress [TASKS]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use gvcsp::{Chan, Runtime, RuntimeConfig};
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let filter = EnvFilter::try_from_env("GVCSP_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .init();
}

fn main() {
    init_logging();
    println!("=== gvcsp Stress Test ===\n");

    let num_tasks: usize = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(10_000);

    let config = RuntimeConfig::from_env()
        .stack_size(64 * 1024)
        .max_tasks(num_tasks + 16);
    let rt = match Runtime::new(config) {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!(error = %e, "failed to start runtime");
            std::process::exit(1);
        }
    };
    println!("Workers: {}  Policy: {}", rt.num_workers(), rt.config().policy);
    println!("Spawning {} tasks...", num_tasks);

    let completed = Arc::new(AtomicU64::new(0));
    let done = completed.clone();
    let (spawn_time, total_time, sum) = rt.block_on(move |cx| {
        let start = Instant::now();
        let results = Chan::<u64>::new();

        let handles: Vec<_> = (0..num_tasks as u64)
            .map(|i| {
                let done = done.clone();
                let tx = results.clone();
                cx.spawn(move |cx| {
                    // a little work
                    for _ in 0..10 {
                        cx.yield_now();
                    }
                    tx.write(cx, i);
                    done.fetch_add(1, Ordering::Relaxed);
                })
            })
            .collect();
        let spawn_time = start.elapsed();

        let mut sum = 0u64;
        for _ in 0..num_tasks {
            sum += results.read(cx);
        }
        for h in &handles {
            cx.join(h);
        }
        (spawn_time, start.elapsed(), sum)
    });

    let expected = (num_tasks as u64).saturating_sub(1) * num_tasks as u64 / 2;

    println!("\n=== Results ===");
    println!("Total tasks:  {}", num_tasks);
    println!("Completed:    {}", completed.load(Ordering::Relaxed));
    println!("Checksum:     {} ({})", sum, if sum == expected { "ok" } else { "MISMATCH" });
    println!("Spawn time:   {:?}", spawn_time);
    println!("Total time:   {:?}", total_time);
    println!(
        "Throughput:   {:.0} tasks/sec",
        num_tasks as f64 / total_time.as_secs_f64()
    );
}
