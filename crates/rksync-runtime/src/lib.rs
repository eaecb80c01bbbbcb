//! # rksync-runtime
//!
//! Platform-specific runtime for rksync.
//!
//! This crate provides:
//! - Raw OS mutex selection (pthread on unix, parking_lot elsewhere)
//! - `ExclusiveLock` and `ReadWriteLock` with contention counters
//! - `ConditionLock`, a mutex/condvar pair with scoped guards
//! - Submitter parking (futex on Linux)
//! - The fixed-size `ThreadPool`

pub mod sys;
pub mod lock;
pub mod rwlock;
pub mod condition;
pub mod parking;
pub mod config;
pub mod pool;

// Re-exports
pub use config::PoolConfig;
pub use lock::{fast_lock, fast_unlock, ExclusiveGuard, ExclusiveLock};
pub use rwlock::{fast_read_write_lock, fast_read_write_unlock, ReadGuard, ReadWriteLock, WriteGuard};
pub use condition::{ConditionGuard, ConditionLock};
pub use parking::{new_parking, Parking};
pub use pool::{JobHandle, ThreadPool};
