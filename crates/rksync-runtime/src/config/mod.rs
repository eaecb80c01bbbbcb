//! Thread pool configuration
//!
//! Library defaults with environment overrides, then builder methods on
//! top.
//!
//! ```rust,ignore
//! use rksync_runtime::config::PoolConfig;
//!
//! let config = PoolConfig::from_env()
//!     .num_workers(4)
//!     .park_timeout(Duration::from_millis(5));
//! config.validate()?;
//! ```

pub mod defaults;

use rksync_core::constants::{MAX_WORKERS, MIN_STACK_SIZE};
use rksync_core::env::{env_get, env_get_bool, env_get_millis};
use rksync_core::ConfigError;
use std::time::Duration;

/// Thread pool configuration with builder methods
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Worker threads, one slot each
    pub num_workers: usize,
    /// Longest a submitter sleeps between idle-queue checks
    pub park_timeout: Duration,
    /// Worker thread stack size in bytes, 0 for the platform default
    pub stack_size: usize,
    /// Log worker lifecycle transitions at debug level
    pub debug_logging: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl PoolConfig {
    /// Defaults with environment overrides.
    ///
    /// - `RKS_NUM_WORKERS` - worker threads
    /// - `RKS_PARK_TIMEOUT_MS` - submitter park timeout
    /// - `RKS_STACK_SIZE` - worker stack size in bytes
    /// - `RKS_DEBUG` - lifecycle logging (0/1)
    pub fn from_env() -> Self {
        Self {
            num_workers: resolve_workers(env_get("RKS_NUM_WORKERS", defaults::NUM_WORKERS)),
            park_timeout: env_get_millis("RKS_PARK_TIMEOUT_MS", defaults::PARK_TIMEOUT_MS),
            stack_size: env_get("RKS_STACK_SIZE", defaults::STACK_SIZE),
            debug_logging: env_get_bool("RKS_DEBUG", defaults::DEBUG_LOGGING),
        }
    }

    /// Library defaults only, ignoring the environment
    pub fn new() -> Self {
        Self {
            num_workers: resolve_workers(defaults::NUM_WORKERS),
            park_timeout: Duration::from_millis(defaults::PARK_TIMEOUT_MS),
            stack_size: defaults::STACK_SIZE,
            debug_logging: defaults::DEBUG_LOGGING,
        }
    }

    pub fn num_workers(mut self, n: usize) -> Self {
        self.num_workers = n;
        self
    }

    pub fn park_timeout(mut self, d: Duration) -> Self {
        self.park_timeout = d;
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = size;
        self
    }

    pub fn debug_logging(mut self, enable: bool) -> Self {
        self.debug_logging = enable;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_workers == 0 {
            return Err(ConfigError::InvalidValue("num_workers must be > 0"));
        }
        if self.num_workers > MAX_WORKERS {
            return Err(ConfigError::InvalidValue("num_workers must be <= 64"));
        }
        if self.park_timeout.is_zero() {
            return Err(ConfigError::InvalidValue("park_timeout must be > 0"));
        }
        if self.stack_size != 0 && self.stack_size < MIN_STACK_SIZE {
            return Err(ConfigError::InvalidValue("stack_size must be 0 or >= 16KB"));
        }
        Ok(())
    }

    /// Log the configuration at info level
    pub fn log_summary(&self) {
        log::info!(
            "pool config: workers={} park_timeout={:?} stack_size={} debug={}",
            self.num_workers,
            self.park_timeout,
            self.stack_size,
            self.debug_logging
        );
    }
}

/// CPU cores visible to this process, at least 1
pub fn detected_cpu_cores() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}

fn resolve_workers(requested: usize) -> usize {
    match requested {
        0 => detected_cpu_cores().min(MAX_WORKERS),
        n => n,
    }
}
