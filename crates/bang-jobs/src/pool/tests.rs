//! Unit tests for the worker pool.

use std::sync::Barrier;
use std::time::Duration;

use rstest::rstest;

use super::*;

fn pool(size: usize) -> WorkerPool {
    WorkerPool::new(PoolSettings::new(size)).expect("pool starts")
}

#[test]
fn rejects_empty_pool() {
    let error = WorkerPool::new(PoolSettings::new(0)).expect_err("empty pool should fail");
    assert!(matches!(error, PoolError::InvalidSize));
}

#[test]
fn returns_task_value() {
    let pool = pool(1);
    let handle = pool.submit(|_| 40 + 2).expect("submit");
    assert_eq!(handle.wait().expect("task completes"), 42);
}

#[test]
fn runs_tasks_on_named_workers() {
    let pool = pool(2);
    let handle = pool
        .submit(|_| thread::current().name().map(str::to_owned))
        .expect("submit");
    let name = handle.wait().expect("task completes").expect("thread named");
    assert!(name.starts_with("bang-worker-"), "unexpected name {name}");
}

#[test]
fn reports_panics_and_keeps_serving() {
    let pool = pool(1);
    let failed = pool
        .submit(|_| -> u8 { panic!("deployment exploded") })
        .expect("submit");
    match failed.wait() {
        Err(ExecutionFault::Panicked { message }) => assert_eq!(message, "deployment exploded"),
        other => panic!("expected panic fault, got {other:?}"),
    }

    let next = pool.submit(|_| "still alive").expect("submit after panic");
    assert_eq!(next.wait().expect("task completes"), "still alive");
}

#[test]
fn runs_tasks_concurrently() {
    let pool = pool(2);
    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let barrier = Arc::clone(&barrier);
            pool.submit(move |context| {
                barrier.wait();
                context.index()
            })
            .expect("submit")
        })
        .collect();
    let mut indices: Vec<usize> = handles
        .into_iter()
        .map(|handle| handle.wait().expect("task completes"))
        .collect();
    indices.sort_unstable();
    assert_eq!(indices, vec![0, 1]);
}

#[rstest]
#[case::default_forbids(PoolSettings::new(1), ChildProcessPolicy::Forbidden)]
#[case::explicit_allow(PoolSettings::new(1).allow_child_processes(), ChildProcessPolicy::Allowed)]
fn exposes_child_process_policy(
    #[case] settings: PoolSettings,
    #[case] expected: ChildProcessPolicy,
) {
    let pool = WorkerPool::new(settings).expect("pool starts");
    assert_eq!(pool.settings().child_processes(), expected);
    let seen = pool
        .submit(|context| context.child_processes())
        .expect("submit")
        .wait()
        .expect("task completes");
    assert_eq!(seen, expected);
}

#[test]
fn queued_tasks_finish_when_pool_is_dropped() {
    let pool = pool(1);
    let slow = pool
        .submit(|_| thread::sleep(Duration::from_millis(20)))
        .expect("submit");
    let queued = pool.submit(|_| 7).expect("submit");
    drop(pool);
    slow.wait().expect("slow task completes");
    assert_eq!(queued.wait().expect("queued task completes"), 7);
}
