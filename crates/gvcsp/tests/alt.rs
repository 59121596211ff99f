use std::time::{Duration, Instant};

use gvcsp::{Alt, Chan, PolicyKind, Runtime, RuntimeConfig, Selected};

fn runtime(workers: usize) -> Runtime {
    Runtime::new(
        RuntimeConfig::new()
            .num_workers(workers)
            .policy(PolicyKind::WorkStealing)
            .max_tasks(256)
            .pin_workers(false),
    )
    .unwrap()
}

#[test]
fn test_timeout_leaves_channels_untouched() {
    let rt = runtime(2);
    let (sel, elapsed, pending, after) = rt.block_on(|cx| {
        let c1 = Chan::<u64>::new();
        let c2 = Chan::<u64>::new();
        let (mut a, mut b) = (0u64, 0u64);

        let start = Instant::now();
        let sel = Alt::new()
            .recv(&c1, &mut a)
            .recv(&c2, &mut b)
            .timeout(Duration::from_millis(50))
            .select(cx);
        let elapsed = start.elapsed();

        let pending: usize = [&c1, &c2]
            .iter()
            .map(|c| c.raw().pending_guards() + c.raw().pending_readers() + c.raw().pending_writers())
            .sum();

        // both channels still rendezvous normally afterwards
        let tx = c1.clone();
        let w = cx.spawn(move |cx| tx.write(cx, 5));
        let after = c1.read(cx);
        cx.join(&w);
        (sel, elapsed, pending, after + a + b)
    });
    assert_eq!(sel, Selected::Timeout);
    assert!(elapsed >= Duration::from_millis(50));
    assert_eq!(pending, 0);
    assert_eq!(after, 5);
}

#[test]
fn test_alt_picks_written_branch() {
    let rt = runtime(2);
    let (sel, v) = rt.block_on(|cx| {
        let c1 = Chan::<u32>::new();
        let c2 = Chan::<u32>::new();
        let tx = c2.clone();
        let w = cx.spawn(move |cx| {
            cx.sleep(Duration::from_millis(5));
            tx.write(cx, 77);
        });
        let (mut a, mut b) = (0u32, 0u32);
        let sel = Alt::new()
            .recv(&c1, &mut a)
            .recv(&c2, &mut b)
            .timeout(Duration::from_secs(5))
            .select(cx);
        cx.join(&w);
        (sel, b)
    });
    assert_eq!(sel, Selected::Branch(1));
    assert_eq!(v, 77);
}

#[test]
fn test_server_loop_over_two_channels() {
    let rt = runtime(3);
    let (from_a, from_b) = rt.block_on(|cx| {
        let ca = Chan::<u64>::new();
        let cb = Chan::<u64>::new();
        let producers: Vec<_> = [(ca.clone(), 1u64), (cb.clone(), 1000u64)]
            .into_iter()
            .map(|(tx, unit)| {
                cx.spawn(move |cx| {
                    for _ in 0..50 {
                        tx.write(cx, unit);
                    }
                })
            })
            .collect();

        let (mut from_a, mut from_b) = (0u64, 0u64);
        for _ in 0..100 {
            let (mut a, mut b) = (0u64, 0u64);
            match Alt::new().recv(&ca, &mut a).recv(&cb, &mut b).select(cx) {
                Selected::Branch(0) => from_a += a,
                Selected::Branch(_) => from_b += b,
                Selected::Timeout => {}
            }
        }
        for p in &producers {
            cx.join(p);
        }
        (from_a, from_b)
    });
    assert_eq!(from_a, 50);
    assert_eq!(from_b, 50_000);
}

/// Writers on three channels and a near-immediate deadline race one alt.
/// Exactly one offer is taken by the alt; every other value is drained by
/// plain reads afterwards, so each value must be seen exactly once.
#[test]
fn test_racing_offers_commit_once() {
    let rt = runtime(4);
    let rounds = rt.block_on(|cx| {
        let chans: Vec<Chan<u64>> = (0..3).map(|_| Chan::new()).collect();
        let mut timeouts = 0u32;
        for round in 0..200u64 {
            let writers: Vec<_> = chans
                .iter()
                .enumerate()
                .map(|(i, c)| {
                    let tx = c.clone();
                    cx.spawn(move |cx| tx.write(cx, round * 10 + i as u64))
                })
                .collect();

            let mut got = [u64::MAX; 3];
            let sel = {
                let [g0, g1, g2] = &mut got;
                Alt::new()
                    .recv(&chans[0], g0)
                    .recv(&chans[1], g1)
                    .recv(&chans[2], g2)
                    .timeout(Duration::from_micros(round % 50))
                    .select(cx)
            };

            let mut seen = Vec::new();
            match sel {
                Selected::Branch(i) => seen.push((i, got[i])),
                Selected::Timeout => timeouts += 1,
            }
            for (i, c) in chans.iter().enumerate() {
                if sel != Selected::Branch(i) {
                    seen.push((i, c.read(cx)));
                }
            }
            for w in &writers {
                cx.join(w);
            }
            seen.sort();
            let expected: Vec<_> = (0..3).map(|i| (i, round * 10 + i as u64)).collect();
            if seen != expected {
                return Err(format!("round {round}: {seen:?}"));
            }
            // untouched slots stay untouched
            for (i, v) in got.iter().enumerate() {
                if sel != Selected::Branch(i) && *v != u64::MAX {
                    return Err(format!("round {round}: branch {i} written without winning"));
                }
            }
        }
        Ok(timeouts)
    });
    assert!(rounds.is_ok(), "{rounds:?}");
}
