//! Stress run - locks and pool under load
//!
//! Usage: `stress [-v...] [ITERATIONS]`
//!
//! Hammers an `ExclusiveLock`, drives a `ReadWriteLock`-guarded pattern
//! cache from many threads, then pushes jobs through a `ThreadPool` and
//! reaps it from two threads at once.

mod logging;

use rksync::{
    ExclusiveLock, LockLevel, LockStrategy, PoolConfig, PoolError, ReadWriteLock, ThreadPool,
};
use std::cell::UnsafeCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

/// Stand-in for a compiled-pattern cache
struct PatternCache {
    lock: ReadWriteLock,
    entries: UnsafeCell<HashMap<u32, u64>>,
}

// Safety: `entries` is only read under a read lock and only written under
// the write lock
unsafe impl Sync for PatternCache {}

impl PatternCache {
    fn new() -> Self {
        PatternCache {
            lock: ReadWriteLock::new(),
            entries: UnsafeCell::new(HashMap::new()),
        }
    }

    /// Look up `key`, compiling it on a miss when the write lock is free
    fn get_or_compile(&self, key: u32) -> Option<u64> {
        let found = match self.lock.acquire(LockStrategy::TryForWritingThenForReading) {
            LockLevel::Write => {
                let entries = unsafe { &mut *self.entries.get() };
                let value = *entries.entry(key).or_insert_with(|| compile(key));
                Some(value)
            }
            _ => unsafe { (*self.entries.get()).get(&key).copied() },
        };
        self.lock.unlock();
        found
    }
}

fn compile(key: u32) -> u64 {
    (0..64u64).fold(key as u64, |acc, i| acc.wrapping_mul(31).wrapping_add(i))
}

fn parse_args() -> (u8, usize) {
    let mut verbose = 0u8;
    let mut iterations = 10_000;
    for arg in std::env::args().skip(1) {
        if arg.starts_with('-') && arg.chars().skip(1).all(|c| c == 'v') {
            verbose = verbose.saturating_add((arg.len() - 1) as u8);
        } else if let Ok(n) = arg.parse() {
            iterations = n;
        }
    }
    (verbose, iterations)
}

fn threads() -> usize {
    2 * rksync::config::detected_cpu_cores()
}

fn stress_exclusive(iterations: usize) {
    let lock = Arc::new(ExclusiveLock::new());
    let counter = Arc::new(AtomicU64::new(0));
    let n = threads();
    let start = Instant::now();

    let handles: Vec<_> = (0..n)
        .map(|_| {
            let (lock, counter) = (Arc::clone(&lock), Arc::clone(&counter));
            thread::spawn(move || {
                for _ in 0..iterations {
                    let _g = lock.guard();
                    let v = counter.load(Ordering::Relaxed);
                    counter.store(v + 1, Ordering::Relaxed);
                }
            })
        })
        .collect();
    for h in handles {
        if h.join().is_err() {
            log::error!("exclusive stress thread panicked");
        }
    }

    let total = counter.load(Ordering::Relaxed);
    println!("exclusive: {} threads x {} = {} in {:?}", n, iterations, total, start.elapsed());
    println!("  {:?}", lock);
    if total != (n * iterations) as u64 {
        log::error!("lost updates: expected {}, got {}", n * iterations, total);
    }
}

fn stress_cache(iterations: usize) {
    let cache = Arc::new(PatternCache::new());
    let n = threads();
    let start = Instant::now();

    let handles: Vec<_> = (0..n)
        .map(|t| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                let mut hits = 0usize;
                for i in 0..iterations {
                    let key = ((i * 7 + t) % 512) as u32;
                    if let Some(v) = cache.get_or_compile(key) {
                        debug_assert_eq!(v, compile(key));
                        hits += 1;
                    }
                }
                hits
            })
        })
        .collect();
    let hits: usize = handles.into_iter().filter_map(|h| h.join().ok()).sum();

    println!("cache: {} lookups, {} hits in {:?}", n * iterations, hits, start.elapsed());
    println!("  {:?}", cache.lock);
}

fn stress_pool(iterations: usize) -> Result<(), PoolError> {
    let pool = Arc::new(ThreadPool::with_config(PoolConfig::from_env())?);
    pool.config().log_summary();
    let done = Arc::new(AtomicU64::new(0));
    let start = Instant::now();

    let mut handles = Vec::with_capacity(iterations);
    for i in 0..iterations {
        let done = Arc::clone(&done);
        handles.push(pool.submit(move || {
            std::hint::black_box(compile(i as u32));
            done.fetch_add(1, Ordering::Relaxed);
        })?);
    }
    let panicked = handles
        .iter()
        .filter(|h| {
            h.wait();
            h.panicked()
        })
        .count();

    println!(
        "pool: {} jobs on {} workers in {:?} ({} waited for a worker, {} panicked)",
        done.load(Ordering::Relaxed),
        pool.thread_count(),
        start.elapsed(),
        pool.backpressure_count(),
        panicked
    );

    let reapers: Vec<_> = (0..2)
        .map(|_| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || pool.reap_threads())
        })
        .collect();
    for r in reapers {
        if r.join().is_err() {
            log::error!("reaper panicked");
        }
    }
    println!("  reaped: {}, live threads: {}", pool.is_reaped(), pool.live_threads());

    match pool.submit(|| {}) {
        Err(PoolError::Stopped) => Ok(()),
        Err(e) => Err(e),
        Ok(_) => {
            log::error!("submit accepted after reap");
            Ok(())
        }
    }
}

fn main() {
    let (verbose, iterations) = parse_args();
    if let Err(e) = logging::setup_logging(verbose, 2) {
        eprintln!("logging setup failed: {}", e);
    }

    println!("=== rksync stress ({} iterations) ===\n", iterations);
    stress_exclusive(iterations);
    stress_cache(iterations);
    if let Err(e) = stress_pool(iterations) {
        log::error!("pool stress failed: {}", e);
        std::process::exit(1);
    }
}
