use corebound::{AffinityPool, Job, WaitStrategy};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

fn wait_for(done: &AtomicUsize, target: usize, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    while done.load(Ordering::SeqCst) < target {
        assert!(Instant::now() < deadline, "tasks did not complete in time");
        thread::yield_now();
    }
}

#[test]
fn test_worker_replaced_after_task_panic() {
    let pool = AffinityPool::new("replace", 1, 8, WaitStrategy::Parking).unwrap();

    let failing = Job::new(|| {
        panic!("task failure");
    });
    pool.execute(failing.clone()).unwrap();

    // A failing task kills its worker; the pool must bring up a replacement
    // on the same queue and keep processing.
    let completed = Arc::new(AtomicUsize::new(0));
    let jobs: Vec<Job> = (0..5)
        .map(|_| {
            let completed_clone = completed.clone();
            Job::new(move || {
                completed_clone.fetch_add(1, Ordering::SeqCst);
            })
        })
        .collect();
    for job in &jobs {
        while pool.execute(job.clone()).is_err() {
            thread::yield_now();
        }
    }

    wait_for(&completed, 5, Duration::from_secs(10));

    pool.shutdown();
    assert!(pool.await_termination(Duration::from_secs(5)));
}

#[test]
fn test_pool_survives_repeated_panics() {
    let pool = AffinityPool::new("stubborn", 2, 16, WaitStrategy::Parking).unwrap();
    let completed = Arc::new(AtomicUsize::new(0));

    let failers: Vec<Job> = (0..3).map(|_| Job::new(|| panic!("boom"))).collect();
    let workers_before = pool.stats().workers;
    assert_eq!(workers_before, 2);

    for (i, failer) in failers.iter().enumerate() {
        while pool.execute(failer.clone()).is_err() {
            thread::yield_now();
        }
        let completed_clone = completed.clone();
        let ok = Job::new(move || {
            completed_clone.fetch_add(1, Ordering::SeqCst);
        });
        while pool.execute(ok.clone()).is_err() {
            thread::yield_now();
        }
        wait_for(&completed, i + 1, Duration::from_secs(10));
    }

    assert_eq!(completed.load(Ordering::SeqCst), 3);
    pool.shutdown();
    assert!(pool.await_termination(Duration::from_secs(5)));
}
