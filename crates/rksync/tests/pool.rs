use rksync::{ConditionLock, PoolConfig, PoolError, ThreadPool, WorkerStatus};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

fn pool_of(n: usize) -> ThreadPool {
    ThreadPool::with_config(PoolConfig::new().num_workers(n).park_timeout(Duration::from_millis(2))).unwrap()
}

/// Closed until `open` is called; jobs block on it
struct Gate(ConditionLock<bool>);

impl Gate {
    fn new() -> Arc<Self> {
        Arc::new(Gate(ConditionLock::new(false)))
    }

    fn pass(&self) {
        drop(self.0.lock_when(|open| *open));
    }

    fn open(&self) {
        self.0.lock().unlock_with(true);
    }
}

#[test]
fn jobs_up_to_worker_count_run_concurrently() {
    const WORKERS: usize = 4;
    let pool = pool_of(WORKERS);
    let all_running = Arc::new(Barrier::new(WORKERS + 1));

    let handles: Vec<_> = (0..WORKERS)
        .map(|_| {
            let all_running = Arc::clone(&all_running);
            pool.submit(move || {
                all_running.wait();
            })
            .unwrap()
        })
        .collect();

    // Deadlocks unless every job is running at the same time
    all_running.wait();
    for h in handles {
        h.wait();
    }
    assert_eq!(pool.backpressure_count(), 0);
}

#[test]
fn extra_submission_waits_for_a_free_worker() {
    let pool = Arc::new(pool_of(2));
    let gate = Gate::new();

    let busy: Vec<_> = (0..2)
        .map(|_| {
            let gate = Arc::clone(&gate);
            pool.submit(move || gate.pass()).unwrap()
        })
        .collect();

    let submitted = Arc::new(AtomicBool::new(false));
    let extra = {
        let (pool, submitted) = (Arc::clone(&pool), Arc::clone(&submitted));
        thread::spawn(move || {
            let handle = pool.submit(|| {}).unwrap();
            submitted.store(true, Ordering::SeqCst);
            handle.wait();
        })
    };

    thread::sleep(Duration::from_millis(100));
    assert!(!submitted.load(Ordering::SeqCst));
    assert_eq!(pool.idle_threads(), 0);

    gate.open();
    extra.join().unwrap();
    assert!(submitted.load(Ordering::SeqCst));
    assert_eq!(pool.backpressure_count(), 1);
    for h in busy {
        assert!(h.wait().is_completed());
    }
}

#[test]
fn concurrent_reap_completes_once() {
    let pool = Arc::new(pool_of(3));
    let start = Arc::new(Barrier::new(2));

    let reapers: Vec<_> = (0..2)
        .map(|_| {
            let (pool, start) = (Arc::clone(&pool), Arc::clone(&start));
            thread::spawn(move || {
                start.wait();
                pool.reap_threads();
                assert!(pool.is_reaped());
                assert_eq!(pool.live_threads(), 0);
                assert_eq!(pool.idle_threads(), 0);
            })
        })
        .collect();
    for r in reapers {
        r.join().unwrap();
    }

    for i in 0..pool.thread_count() {
        assert_eq!(pool.worker_status(i), Some(WorkerStatus::NotRunning));
    }
    pool.reap_threads();
    assert!(pool.is_reaped());
}

#[test]
fn submit_after_reap_fails() {
    let pool = pool_of(2);
    pool.reap_threads();
    for _ in 0..3 {
        assert!(matches!(pool.submit(|| {}), Err(PoolError::Stopped)));
    }
}

#[test]
fn reap_lets_running_job_finish() {
    let pool = pool_of(1);
    let finished = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&finished);
    let handle = pool
        .submit(move || {
            thread::sleep(Duration::from_millis(50));
            flag.store(true, Ordering::SeqCst);
        })
        .unwrap();

    pool.reap_threads();
    assert!(finished.load(Ordering::SeqCst));
    assert!(handle.is_completed());
}

#[test]
fn blocked_submitter_released_by_reap() {
    let pool = Arc::new(pool_of(1));
    let gate = Gate::new();
    let busy = {
        let gate = Arc::clone(&gate);
        pool.submit(move || gate.pass()).unwrap()
    };

    let submitter = {
        let pool = Arc::clone(&pool);
        thread::spawn(move || pool.submit(|| {}).map(|_| ()))
    };
    while pool.backpressure_count() == 0 {
        thread::yield_now();
    }

    let reaper = {
        let pool = Arc::clone(&pool);
        thread::spawn(move || pool.reap_threads())
    };
    while !pool.is_stopping() {
        thread::yield_now();
    }

    assert!(matches!(submitter.join().unwrap(), Err(PoolError::Stopped)));
    gate.open();
    reaper.join().unwrap();
    assert!(busy.is_completed());
    assert!(pool.is_reaped());
}

#[test]
fn every_job_runs_exactly_once() {
    let pool = pool_of(4);
    let runs = Arc::new(AtomicUsize::new(0));
    let handles: Vec<_> = (0..200)
        .map(|_| {
            let runs = Arc::clone(&runs);
            pool.submit(move || {
                runs.fetch_add(1, Ordering::Relaxed);
            })
            .unwrap()
        })
        .collect();
    for h in &handles {
        h.wait();
    }
    assert_eq!(runs.load(Ordering::Relaxed), 200);
    assert!(pool.live_threads() <= pool.thread_count());
}
