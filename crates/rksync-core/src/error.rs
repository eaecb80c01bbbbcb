//! Error types for rksync

use std::io;

/// Result type for pool operations
pub type PoolResult<T> = Result<T, PoolError>;

/// Errors surfaced by the thread pool
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// A worker thread could not be created; the pool was rolled back
    #[error("failed to spawn worker thread {index}: {source}")]
    Spawn {
        /// Slot whose thread failed to start
        index: usize,
        #[source]
        source: io::Error,
    },

    /// The pool is stopping or already reaped and accepts no work
    #[error("thread pool is stopped")]
    Stopped,

    /// Configuration rejected by `PoolConfig::validate`
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),
}

/// Configuration error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    InvalidValue(&'static str),
}

/// Failure reported by an OS lock primitive
///
/// `code` is the raw errno-style return value of the primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PrimitiveError {
    /// Transient failure; the operation may be retried
    #[error("{op}: spurious failure (code {code})")]
    Spurious { op: &'static str, code: i32 },

    /// The primitive detected a caller bug (e.g. unlocking a lock not held)
    #[error("{op}: misuse (code {code})")]
    Misuse { op: &'static str, code: i32 },
}

impl PrimitiveError {
    #[inline]
    pub fn is_spurious(&self) -> bool {
        matches!(self, PrimitiveError::Spurious { .. })
    }

    #[inline]
    pub fn code(&self) -> i32 {
        match self {
            PrimitiveError::Spurious { code, .. } | PrimitiveError::Misuse { code, .. } => *code,
        }
    }
}
