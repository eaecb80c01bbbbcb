//! Read/write acquisition strategies

use core::fmt;

/// How a read/write lock acquisition may block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStrategy {
    /// Block until a read lock is granted
    ForReading,
    /// Block until the write lock is granted
    ForWriting,
    /// Take a read lock only if immediately available
    TryForReading,
    /// Take the write lock only if immediately available
    TryForWriting,
    /// Try the write lock, otherwise block for a read lock
    TryForWritingThenForReading,
    /// Try the write lock, otherwise try a read lock
    TryForWritingThenTryForReading,
}

impl LockStrategy {
    /// Every strategy, in declaration order
    pub const ALL: [LockStrategy; 6] = [
        LockStrategy::ForReading,
        LockStrategy::ForWriting,
        LockStrategy::TryForReading,
        LockStrategy::TryForWriting,
        LockStrategy::TryForWritingThenForReading,
        LockStrategy::TryForWritingThenTryForReading,
    ];

    /// Whether the strategy can suspend the caller
    #[inline]
    pub const fn may_block(self) -> bool {
        matches!(
            self,
            LockStrategy::ForReading
                | LockStrategy::ForWriting
                | LockStrategy::TryForWritingThenForReading
        )
    }

    /// Whether the strategy can end in a write lock
    #[inline]
    pub const fn may_write(self) -> bool {
        !matches!(self, LockStrategy::ForReading | LockStrategy::TryForReading)
    }

    /// Whether the strategy can fail to acquire anything
    #[inline]
    pub const fn may_fail(self) -> bool {
        !self.may_block()
    }
}

/// What an acquisition actually obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LockLevel {
    Unlocked,
    Read,
    Write,
}

impl LockLevel {
    #[inline]
    pub const fn is_locked(self) -> bool {
        !matches!(self, LockLevel::Unlocked)
    }
}

impl fmt::Display for LockLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockLevel::Unlocked => write!(f, "unlocked"),
            LockLevel::Read => write!(f, "read"),
            LockLevel::Write => write!(f, "write"),
        }
    }
}
