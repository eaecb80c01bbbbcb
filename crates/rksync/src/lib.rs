//! # rksync
//!
//! Concurrency core for a regular-expression layer: locks that guard
//! shared engine state (compiled-pattern caches and the like) and a
//! fixed-size pool that runs matching work on one thread per core.
//!
//! ## Features
//!
//! - **ExclusiveLock**: OS mutex with a try-first fast path, busy/spin
//!   counters and a debug mode
//! - **ReadWriteLock**: six acquisition strategies, write-to-read
//!   downgrade, per-mode counters
//! - **ThreadPool**: N workers, an idle queue, submitter backpressure,
//!   idempotent teardown
//!
//! ## Quick Start
//!
//! ```ignore
//! use rksync::{LockStrategy, LockLevel, ReadWriteLock, ThreadPool};
//!
//! let cache_lock = ReadWriteLock::new();
//! match cache_lock.acquire(LockStrategy::TryForWritingThenForReading) {
//!     LockLevel::Write => { /* insert the compiled pattern */ }
//!     _ => { /* read the existing entry */ }
//! }
//! cache_lock.unlock();
//!
//! let pool = ThreadPool::initialize()?;
//! let job = pool.submit(|| run_match())?;
//! job.wait();
//! pool.reap_threads();
//! ```
//!
//! ## Architecture
//!
//! ```text
//!   callers ──► ExclusiveLock / ReadWriteLock      (guard shared state)
//!   callers ──► ThreadPool::submit
//!                  │ idle queue pop (park while empty)
//!                  ▼
//!           ┌─────────────┐   condition   ┌──────────┐
//!           │ worker slot │ ────────────► │  worker  │ runs job,
//!           └─────────────┘               └──────────┘ re-queues itself
//! ```
//!
//! ## Environment
//!
//! `RKS_NUM_WORKERS`, `RKS_PARK_TIMEOUT_MS`, `RKS_STACK_SIZE` and
//! `RKS_DEBUG` override the pool defaults; see `PoolConfig::from_env`.

pub use rksync_core::{
    atomic, constants, env, AtomicBits, ConfigError, Counter, JobStatus, LockLevel, LockStrategy,
    Locking, PoolControl, PoolError, PoolResult, PrimitiveError, WorkerStatus,
};

pub use rksync_runtime::{
    fast_lock, fast_read_write_lock, fast_read_write_unlock, fast_unlock, ConditionGuard,
    ConditionLock, ExclusiveGuard, ExclusiveLock, JobHandle, PoolConfig, ReadGuard, ReadWriteLock,
    ThreadPool, WriteGuard,
};

/// Pool configuration helpers
pub mod config {
    pub use rksync_runtime::config::{defaults, detected_cpu_cores, PoolConfig};
}
