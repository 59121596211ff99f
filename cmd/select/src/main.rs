//! Alt over several producers with a timeout
//!
//! Three producers write at different rates; a server task selects over
//! their channels with a deadline and reports which branch fired.
//!
//! Usage: select [MESSAGES_PER_PRODUCER]

use std::time::{Duration, Instant};

use gvcsp::{Alt, Chan, Runtime, RuntimeConfig, Selected};
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
    println!("=== gvcsp Select ===\n");

    let per_producer: u64 = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(20);

    let rt = match Runtime::new(RuntimeConfig::from_env()) {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!(error = %e, "failed to start runtime");
            std::process::exit(1);
        }
    };

    let (counts, timeouts, elapsed) = rt.block_on(move |cx| {
        let chans: Vec<Chan<u64>> = (0..3).map(|_| Chan::new()).collect();
        let producers: Vec<_> = chans
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let tx = c.clone();
                let pause = Duration::from_millis(1 + 2 * i as u64);
                cx.spawn(move |cx| {
                    for n in 0..per_producer {
                        cx.sleep(pause);
                        tx.write(cx, n);
                    }
                })
            })
            .collect();

        let start = Instant::now();
        let mut counts = [0u64; 3];
        let mut timeouts = 0u64;
        while counts.iter().sum::<u64>() < 3 * per_producer {
            let mut got = [0u64; 3];
            let selected = {
                let [g0, g1, g2] = &mut got;
                Alt::new()
                    .recv(&chans[0], g0)
                    .recv(&chans[1], g1)
                    .recv(&chans[2], g2)
                    .timeout(Duration::from_millis(2))
                    .select(cx)
            };
            match selected {
                Selected::Branch(i) => {
                    counts[i] += 1;
                    tracing::debug!(branch = i, value = got[i], "received");
                }
                Selected::Timeout => timeouts += 1,
            }
        }
        for p in &producers {
            cx.join(p);
        }
        (counts, timeouts, start.elapsed())
    });

    println!("=== Results ===");
    for (i, n) in counts.iter().enumerate() {
        println!("Branch {}:   {}", i, n);
    }
    println!("Timeouts:   {}", timeouts);
    println!("Total time: {:?}", elapsed);
}
