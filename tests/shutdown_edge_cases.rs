use corebound::{AffinityPool, Job, PoolState, WaitStrategy};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

#[test]
fn test_graceful_shutdown_drains_queued_tasks() {
    let pool = AffinityPool::new("drain", 2, 16, WaitStrategy::Parking).unwrap();
    let started = Arc::new(AtomicUsize::new(0));
    let completed = Arc::new(AtomicUsize::new(0));

    // Ten distinct jobs, each slow enough that several are still queued when
    // shutdown begins. The handles must stay alive until the pool drains.
    let jobs: Vec<Job> = (0..10)
        .map(|_| {
            let started_clone = started.clone();
            let completed_clone = completed.clone();
            Job::new(move || {
                started_clone.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(10));
                completed_clone.fetch_add(1, Ordering::SeqCst);
            })
        })
        .collect();
    for job in &jobs {
        pool.execute(job.clone()).unwrap();
    }

    // Round-robin puts five jobs on each queue; once both workers have
    // picked one up they are in execution and shutdown will let them drain.
    while started.load(Ordering::SeqCst) < 2 {
        thread::yield_now();
    }
    pool.shutdown();
    assert!(pool.await_termination(Duration::from_secs(5)));
    assert_eq!(completed.load(Ordering::SeqCst), 10);
    assert!(pool.is_terminated());
}

#[test]
fn test_hard_shutdown_abandons_queued_tasks() {
    let pool = AffinityPool::new("drop", 2, 16, WaitStrategy::Parking).unwrap();
    let long_started = Arc::new(AtomicBool::new(false));
    let long_completed = Arc::new(AtomicBool::new(false));
    let short_completed = Arc::new(AtomicUsize::new(0));

    let started_clone = long_started.clone();
    let completed_clone = long_completed.clone();
    let long_job = Job::new(move || {
        started_clone.store(true, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(100));
        completed_clone.store(true, Ordering::SeqCst);
    });
    pool.execute(long_job.clone()).unwrap();

    let short_jobs: Vec<Job> = (0..10)
        .map(|_| {
            let short_clone = short_completed.clone();
            Job::new(move || {
                short_clone.fetch_add(1, Ordering::SeqCst);
            })
        })
        .collect();
    for job in &short_jobs {
        pool.execute(job.clone()).unwrap();
    }

    // Make sure the long task is in execution so the hard stop cannot
    // abandon it.
    while !long_started.load(Ordering::SeqCst) {
        thread::yield_now();
    }

    let abandoned = pool.shutdown_now();
    assert!(abandoned.is_empty());
    assert!(pool.await_termination(Duration::from_secs(5)));

    // The in-flight task finishes; queued shorts may or may not have run.
    assert!(long_completed.load(Ordering::SeqCst));
    assert!(short_completed.load(Ordering::SeqCst) <= 10);
}

#[test]
fn test_repeated_shutdown_is_idempotent() {
    let pool = AffinityPool::new("idem", 2, 8, WaitStrategy::Yielding).unwrap();

    pool.shutdown();
    pool.shutdown();
    assert!(pool.await_termination(Duration::from_secs(5)));

    // After termination both stop operations are no-ops.
    pool.shutdown();
    assert!(pool.shutdown_now().is_empty());
    assert_eq!(pool.state(), PoolState::Terminated);
}

#[test]
fn test_shutdown_after_hard_stop_is_noop() {
    let pool = AffinityPool::new("idem2", 2, 8, WaitStrategy::Yielding).unwrap();

    assert!(pool.shutdown_now().is_empty());
    assert!(pool.shutdown_now().is_empty());
    pool.shutdown();
    assert!(pool.await_termination(Duration::from_secs(5)));
    assert!(pool.is_terminated());
}

#[test]
fn test_await_termination_zero_reports_current_state() {
    let pool = AffinityPool::new("zero", 2, 8, WaitStrategy::Yielding).unwrap();
    assert!(!pool.await_termination(Duration::ZERO));

    pool.shutdown_now();
    assert!(pool.await_termination(Duration::from_secs(5)));
    assert!(pool.await_termination(Duration::ZERO));
}

#[test]
fn test_is_shutdown_is_false_while_draining() {
    let pool = AffinityPool::new("draining", 1, 16, WaitStrategy::Parking).unwrap();
    let gate = Arc::new(AtomicBool::new(false));

    let entered = Arc::new(AtomicBool::new(false));
    let entered_clone = entered.clone();
    let gate_clone = gate.clone();
    let blocker = Job::new(move || {
        entered_clone.store(true, Ordering::SeqCst);
        while !gate_clone.load(Ordering::SeqCst) {
            thread::yield_now();
        }
    });
    pool.execute(blocker.clone()).unwrap();
    while !entered.load(Ordering::SeqCst) {
        thread::yield_now();
    }

    pool.shutdown();
    // The worker is stuck in the blocker, so the pool is still draining.
    assert_eq!(pool.state(), PoolState::ShuttingDown);
    assert!(!pool.is_shutdown());

    gate.store(true, Ordering::SeqCst);
    assert!(pool.await_termination(Duration::from_secs(5)));
    assert!(pool.is_shutdown());
    assert!(pool.is_terminated());
}

#[test]
fn test_concurrent_awaiters_all_wake() {
    let pool = Arc::new(AffinityPool::new("waker", 2, 8, WaitStrategy::Yielding).unwrap());

    let awaiters: Vec<_> = (0..2)
        .map(|_| {
            let pool_clone = pool.clone();
            thread::spawn(move || pool_clone.await_termination(Duration::from_secs(10)))
        })
        .collect();

    // Give both awaiters time to park on the termination condition.
    thread::sleep(Duration::from_millis(50));
    pool.shutdown_now();

    for awaiter in awaiters {
        assert!(awaiter.join().unwrap());
    }
}
