//! # rksync-core
//!
//! Core types for the rksync locking and thread pool layer.
//!
//! This crate is platform-agnostic and contains no OS-specific code.
//! All platform-specific implementations are in `rksync-runtime`.
//!
//! ## Modules
//!
//! - `atomic` - Counters, flag bytes, barriers and yield
//! - `state` - Worker, job and pool-control state machines
//! - `strategy` - Read/write acquisition strategies and lock levels
//! - `traits` - The `Locking` protocol shared by both lock types
//! - `error` - Error types
//! - `env` - Environment variable utilities

pub mod atomic;
pub mod state;
pub mod strategy;
pub mod traits;
pub mod error;
pub mod env;

// Re-exports for convenience
pub use atomic::{AtomicBits, Counter};
pub use state::{AtomicWorkerStatus, JobStatus, PoolControl, WorkerStatus};
pub use strategy::{LockLevel, LockStrategy};
pub use traits::Locking;
pub use error::{ConfigError, PoolError, PoolResult, PrimitiveError};
pub use env::{env_get, env_get_bool, env_get_millis};

/// Tunables shared by the lock and pool implementations
pub mod constants {
    /// Spurious failures tolerated per acquisition before the lock gives up
    pub const MAX_SPURIOUS_ERROR_ATTEMPTS: u32 = 2;

    /// Default bounded retries between a failed fast path and blocking
    pub const DEFAULT_SPIN_LIMIT: u32 = 64;

    /// Maximum worker threads in a pool
    pub const MAX_WORKERS: usize = 64;

    /// Smallest explicit worker stack size accepted by the pool
    pub const MIN_STACK_SIZE: usize = 16 * 1024;

    /// Default submitter park timeout in milliseconds
    pub const DEFAULT_PARK_TIMEOUT_MS: u64 = 10;
}
