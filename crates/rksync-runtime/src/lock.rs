//! Exclusive lock with contention instrumentation
//!
//! `ExclusiveLock` wraps one OS mutex. Every acquisition takes the fast
//! path first (a non-blocking try); only when that finds the mutex held
//! does it count the event as busy, retry a bounded number of times and
//! finally block.
//!
//! Spurious primitive failures are retried up to
//! `MAX_SPURIOUS_ERROR_ATTEMPTS` times per acquisition. Past that bound,
//! or on any misuse the primitive detects (unlocking a mutex the caller
//! does not hold, relocking from the owner), the lock panics: a mutex that
//! cannot be acquired is a broken program, not a recoverable condition.
//!
//! # Example
//!
//! ```ignore
//! let cache_lock = ExclusiveLock::new();
//! {
//!     let _guard = cache_lock.guard();
//!     // mutate the shared cache
//! }
//! assert_eq!(cache_lock.busy_count(), 0);
//! ```

use core::marker::PhantomData;
use rksync_core::atomic::{thread_yield, Counter};
use rksync_core::constants::{DEFAULT_SPIN_LIMIT, MAX_SPURIOUS_ERROR_ATTEMPTS};
use rksync_core::{Locking, PrimitiveError};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::sys::{describe, RawMutex};

/// Retries that use a CPU pause hint before falling back to yielding
const PAUSE_SPINS: u32 = 8;

/// Mutual-exclusion lock over an OS mutex
pub struct ExclusiveLock {
    raw: RawMutex,
    busy: Counter,
    spin: Counter,
    spurious_errors: Counter,
    debugging: AtomicBool,
    spin_limit: u32,
}

impl ExclusiveLock {
    /// Create a lock with the default spin limit
    ///
    /// Panics if the OS refuses to create the mutex.
    pub fn new() -> Self {
        Self::with_spin_limit(DEFAULT_SPIN_LIMIT)
    }

    /// Create a lock that retries `spin_limit` times before blocking
    pub fn with_spin_limit(spin_limit: u32) -> Self {
        match Self::try_with_spin_limit(spin_limit) {
            Ok(lock) => lock,
            Err(e) => fatal("ExclusiveLock::new", &e),
        }
    }

    /// Fallible constructor
    pub fn try_with_spin_limit(spin_limit: u32) -> Result<Self, PrimitiveError> {
        Ok(ExclusiveLock {
            raw: RawMutex::new()?,
            busy: Counter::new(),
            spin: Counter::new(),
            spurious_errors: Counter::new(),
            debugging: AtomicBool::new(false),
            spin_limit,
        })
    }

    /// Block until the lock is held; always `true` on return
    #[inline]
    pub fn lock(&self) -> bool {
        fast_lock(self)
    }

    /// Acquire only if the lock is free right now
    pub fn try_lock(&self) -> bool {
        let mut attempts = 0;
        loop {
            match self.raw.try_lock() {
                Ok(true) => return true,
                Ok(false) => {
                    self.busy.increment();
                    return false;
                }
                Err(e) => self.absorb(e, &mut attempts),
            }
        }
    }

    /// Release the lock held by the calling thread
    #[inline]
    pub fn unlock(&self) {
        fast_unlock(self)
    }

    /// Acquire and return a guard that unlocks on drop
    pub fn guard(&self) -> ExclusiveGuard<'_> {
        self.lock();
        ExclusiveGuard { lock: self, _not_send: PhantomData }
    }

    /// Non-blocking `guard`
    pub fn try_guard(&self) -> Option<ExclusiveGuard<'_>> {
        self.try_lock()
            .then(|| ExclusiveGuard { lock: self, _not_send: PhantomData })
    }

    /// Log contention and retry events at debug level
    pub fn set_debug(&self, enable: bool) {
        self.debugging.store(enable, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_debugging(&self) -> bool {
        self.debugging.load(Ordering::Relaxed)
    }

    /// Acquisitions whose fast path found the mutex held
    #[inline]
    pub fn busy_count(&self) -> usize {
        self.busy.get()
    }

    /// Retries made while contended or after a spurious failure
    #[inline]
    pub fn spin_count(&self) -> usize {
        self.spin.get()
    }

    #[inline]
    pub fn spurious_errors_count(&self) -> usize {
        self.spurious_errors.get()
    }

    /// Zero every counter.
    ///
    /// Not atomic with respect to concurrent lockers: only call while no
    /// other thread is locking or unlocking.
    pub fn clear_counters(&self) {
        self.busy.reset();
        self.spin.reset();
        self.spurious_errors.reset();
    }

    /// Count a failed primitive call; panics on misuse or once the retry
    /// bound is exhausted
    fn absorb(&self, err: PrimitiveError, attempts: &mut u32) {
        if !err.is_spurious() {
            fatal("ExclusiveLock", &err);
        }
        self.spurious_errors.increment();
        *attempts += 1;
        if *attempts > MAX_SPURIOUS_ERROR_ATTEMPTS {
            fatal("ExclusiveLock: retry bound exceeded", &err);
        }
        self.spin.increment();
        log::warn!(target: "rksync::lock", "{:p} retrying after {}", self, describe(&err));
    }
}

impl Default for ExclusiveLock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ExclusiveLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExclusiveLock")
            .field("busy", &self.busy_count())
            .field("spin", &self.spin_count())
            .field("spurious_errors", &self.spurious_errors_count())
            .field("debugging", &self.is_debugging())
            .finish()
    }
}

impl Locking for ExclusiveLock {
    fn lock(&self) -> bool {
        fast_lock(self)
    }

    fn unlock(&self) {
        fast_unlock(self)
    }
}

/// Try-then-block acquisition of `lock`
pub fn fast_lock(lock: &ExclusiveLock) -> bool {
    let mut attempts = 0;
    loop {
        match lock.raw.try_lock() {
            Ok(true) => return true,
            Ok(false) => break,
            Err(e) => lock.absorb(e, &mut attempts),
        }
    }

    lock.busy.increment();
    if lock.is_debugging() {
        log::debug!(target: "rksync::lock", "{:p} busy, spinning up to {}", lock, lock.spin_limit);
    }

    for i in 0..lock.spin_limit {
        lock.spin.increment();
        if i < PAUSE_SPINS {
            core::hint::spin_loop();
        } else {
            thread_yield();
        }
        match lock.raw.try_lock() {
            Ok(true) => return true,
            Ok(false) => {}
            Err(e) => lock.absorb(e, &mut attempts),
        }
    }

    loop {
        match lock.raw.lock() {
            Ok(()) => return true,
            Err(e) => lock.absorb(e, &mut attempts),
        }
    }
}

/// Release `lock`; panics if the calling thread does not hold it
pub fn fast_unlock(lock: &ExclusiveLock) {
    let mut attempts = 0;
    while let Err(e) = lock.raw.unlock() {
        lock.absorb(e, &mut attempts);
    }
}

#[track_caller]
fn fatal(context: &str, err: &PrimitiveError) -> ! {
    let detail = describe(err);
    log::error!("{}: {}", context, detail);
    panic!("{}: {}", context, detail);
}

/// Holds an `ExclusiveLock` until dropped
///
/// Not `Send`: the OS mutex must be released by the thread that took it.
pub struct ExclusiveGuard<'a> {
    lock: &'a ExclusiveLock,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ExclusiveGuard<'_> {
    fn drop(&mut self) {
        fast_unlock(self.lock);
    }
}
