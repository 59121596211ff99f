use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use gvcsp::{Chan, PolicyKind, Runtime, RuntimeConfig};

fn runtime(workers: usize, policy: PolicyKind, max_tasks: usize) -> Runtime {
    Runtime::new(
        RuntimeConfig::new()
            .num_workers(workers)
            .policy(policy)
            .stack_size(64 * 1024)
            .max_tasks(max_tasks)
            .pin_workers(false),
    )
    .unwrap()
}

#[test]
fn test_many_independent_tasks_finish() {
    const TASKS: usize = 2000;
    for policy in [PolicyKind::RoundRobin, PolicyKind::WorkStealing] {
        let rt = runtime(4, policy, TASKS + 8);
        let done = Arc::new(AtomicUsize::new(0));
        let d = done.clone();
        let workers_seen = rt.block_on(move |cx| {
            let seen = Arc::new(AtomicU64::new(0));
            let handles: Vec<_> = (0..TASKS)
                .map(|_| {
                    let d = d.clone();
                    let seen = seen.clone();
                    cx.spawn(move |cx| {
                        for _ in 0..5 {
                            seen.fetch_or(1 << cx.worker_id(), Ordering::Relaxed);
                            cx.yield_now();
                        }
                        d.fetch_add(1, Ordering::Relaxed);
                    })
                })
                .collect();
            for h in &handles {
                cx.join(h);
            }
            seen.load(Ordering::Relaxed)
        });
        assert_eq!(done.load(Ordering::Relaxed), TASKS, "policy {policy}");
        assert_ne!(workers_seen, 0);
    }
}

#[test]
fn test_no_task_runs_twice_at_once() {
    // Every task has a shared flag it holds while running between blocking
    // points; finding it already held means two workers resumed the task.
    const TASKS: usize = 64;
    let rt = runtime(4, PolicyKind::WorkStealing, TASKS + 8);
    let overlaps = rt.block_on(|cx| {
        let overlaps = Arc::new(AtomicUsize::new(0));
        let running: Arc<[AtomicUsize]> = (0..TASKS).map(|_| AtomicUsize::new(0)).collect();
        let chan = Chan::<u32>::new();
        let mut handles = Vec::new();
        for n in 0..TASKS {
            let overlaps = overlaps.clone();
            let running = running.clone();
            let tx = chan.clone();
            handles.push(cx.spawn(move |cx| {
                for i in 0..50u32 {
                    if running[n].fetch_add(1, Ordering::SeqCst) != 0 {
                        overlaps.fetch_add(1, Ordering::SeqCst);
                    }
                    std::hint::spin_loop();
                    running[n].fetch_sub(1, Ordering::SeqCst);
                    if i % 10 == 0 {
                        tx.write(cx, i);
                    } else {
                        cx.yield_now();
                    }
                }
            }));
        }
        for _ in 0..TASKS * 5 {
            chan.read(cx);
        }
        for h in &handles {
            cx.join(h);
        }
        overlaps.load(Ordering::SeqCst)
    });
    assert_eq!(overlaps, 0);
}

#[test]
fn test_ring_of_tasks() {
    // A token goes around a ring of tasks connected by channels.
    const RING: usize = 100;
    const LAPS: u64 = 20;
    let rt = runtime(3, PolicyKind::WorkStealing, RING + 8);
    let token = rt.block_on(|cx| {
        let links: Vec<Chan<u64>> = (0..=RING).map(|_| Chan::new()).collect();
        let mut handles = Vec::new();
        for i in 0..RING {
            let rx = links[i].clone();
            let tx = links[i + 1].clone();
            handles.push(cx.spawn(move |cx| {
                for _ in 0..LAPS {
                    let v = rx.read(cx);
                    tx.write(cx, v + 1);
                }
            }));
        }
        let mut v = 0;
        for _ in 0..LAPS {
            links[0].write(cx, v);
            v = links[RING].read(cx);
        }
        for h in &handles {
            cx.join(h);
        }
        v
    });
    assert_eq!(token, RING as u64 * LAPS);
}
