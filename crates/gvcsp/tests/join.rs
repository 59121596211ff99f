use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gvcsp::{PolicyKind, Runtime, RuntimeConfig, TaskArgs, TaskState};

fn runtime(workers: usize) -> Runtime {
    Runtime::new(
        RuntimeConfig::new()
            .num_workers(workers)
            .policy(PolicyKind::WorkStealing)
            .max_tasks(128)
            .pin_workers(false),
    )
    .unwrap()
}

#[test]
fn test_join_waits_for_termination() {
    let rt = runtime(2);
    let (done_flag, terminated) = rt.block_on(|cx| {
        let done = Arc::new(AtomicBool::new(false));
        let d = done.clone();
        let child = cx.spawn(move |cx| {
            cx.sleep(Duration::from_millis(10));
            d.store(true, Ordering::SeqCst);
        });
        cx.join(&child);
        (done.load(Ordering::SeqCst), child.is_terminated())
    });
    assert!(done_flag);
    assert!(terminated);
}

#[test]
fn test_join_terminated_task_returns_at_once() {
    let rt = runtime(1);
    let state = rt.block_on(|cx| {
        let child = cx.spawn(|_| {});
        // a plain yield lets the child run to completion on this worker
        while !child.is_terminated() {
            cx.yield_now();
        }
        cx.join(&child);
        cx.join(&child);
        child.state()
    });
    assert_eq!(state, TaskState::Terminated);
}

#[test]
fn test_many_joiners_one_target() {
    let rt = runtime(3);
    let woke = rt.block_on(|cx| {
        let woke = Arc::new(AtomicUsize::new(0));
        let target = cx.spawn(|cx| cx.sleep(Duration::from_millis(10)));
        let joiners: Vec<_> = (0..5)
            .map(|_| {
                let target = target.clone();
                let woke = woke.clone();
                cx.spawn(move |cx| {
                    cx.join(&target);
                    woke.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();
        for j in &joiners {
            cx.join(j);
        }
        woke.load(Ordering::SeqCst)
    });
    assert_eq!(woke, 5);
}

#[test]
fn test_spawn_with_args() {
    static SUM: AtomicUsize = AtomicUsize::new(0);

    fn add_all(_cx: &gvcsp::Ctx, args: &TaskArgs) {
        SUM.fetch_add(args.as_slice().iter().sum::<usize>(), Ordering::SeqCst);
    }

    let rt = runtime(2);
    rt.block_on(|cx| {
        let h = cx.spawn_with(add_all, TaskArgs::new().with(1).with(2).with(3));
        cx.join(&h);
    });
    assert_eq!(SUM.load(Ordering::SeqCst), 6);
}

#[test]
fn test_external_spawn_then_shutdown() {
    let mut rt = runtime(2);
    let hits = Arc::new(AtomicUsize::new(0));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let hits = hits.clone();
            rt.spawn(move |cx| {
                cx.yield_now();
                hits.fetch_add(1, Ordering::SeqCst);
            })
        })
        .collect();
    rt.shutdown();
    assert_eq!(hits.load(Ordering::SeqCst), 8);
    assert!(handles.iter().all(|h| h.is_terminated()));
}
