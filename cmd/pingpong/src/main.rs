//! Ping-pong over two rendezvous channels
//!
//! Usage: pingpong [ROUNDS]
//!
//! Worker count and policy come from GVCSP_NUM_WORKERS / GVCSP_POLICY.

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
    println!("=== gvcsp Ping-Pong ===\n");

    let rounds: u64 = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(100_000);

    let config = RuntimeConfig::from_env();
    let rt = match Runtime::new(config) {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!(error = %e, "failed to start runtime");
            std::process::exit(1);
        }
    };
    println!("Workers: {}  Policy: {}", rt.num_workers(), rt.config().policy);
    println!("Rounds:  {}\n", rounds);

    let (elapsed, last) = rt.block_on(move |cx| {
        let ping = Chan::<u64>::new();
        let pong = Chan::<u64>::new();
        let (rx, tx) = (ping.clone(), pong.clone());

        let echo = cx.spawn(move |cx| {
            for _ in 0..rounds {
                let v = rx.read(cx);
                tx.write(cx, v + 1);
            }
        });

        let start = Instant::now();
        let mut v = 0;
        for _ in 0..rounds {
            ping.write(cx, v);
            v = pong.read(cx);
        }
        let elapsed = start.elapsed();
        cx.join(&echo);
        (elapsed, v)
    });

    println!("=== Results ===");
    println!("Final value:     {}", last);
    println!("Total time:      {:?}", elapsed);
    if rounds > 0 {
        println!("Per round trip:  {:?}", elapsed / rounds as u32);
        println!("Round trips/sec: {:.0}", rounds as f64 / elapsed.as_secs_f64());
    }
}
