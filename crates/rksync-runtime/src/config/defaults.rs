//! Library defaults for `PoolConfig`

use rksync_core::constants;

/// 0 = one worker per detected CPU core, capped at `MAX_WORKERS`
pub const NUM_WORKERS: usize = 0;

pub const PARK_TIMEOUT_MS: u64 = constants::DEFAULT_PARK_TIMEOUT_MS;

/// 0 = platform default thread stack
pub const STACK_SIZE: usize = 0;

pub const DEBUG_LOGGING: bool = false;
