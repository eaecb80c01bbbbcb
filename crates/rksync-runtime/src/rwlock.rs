//! Reader/writer lock with acquisition strategies and downgrade
//!
//! Built on `parking_lot::RawRwLock` rather than `pthread_rwlock_t`: the
//! pthread lock has no way to turn a held write lock into a read lock
//! without a window where nothing is held, and downgrade must not have one.
//!
//! The lock remembers which thread holds it for writing. That is enough for
//! `unlock()` to release whichever mode the caller holds, and for
//! `downgrade()` to reject a caller that is not the writer.

use core::marker::PhantomData;
use core::time::Duration;
use parking_lot::lock_api::{RawRwLock as _, RawRwLockDowngrade as _, RawRwLockTimed as _};
use rksync_core::atomic::{thread_yield, Counter};
use rksync_core::constants::DEFAULT_SPIN_LIMIT;
use rksync_core::{LockLevel, LockStrategy, Locking};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::sys::current_thread_token;

/// Length of one blocking wait before it is counted as a spin and retried
const WAIT_SLICE: Duration = Duration::from_millis(10);

const PAUSE_SPINS: u32 = 8;

#[derive(Clone, Copy)]
enum Mode {
    Read,
    Write,
}

impl Mode {
    fn name(self) -> &'static str {
        match self {
            Mode::Read => "read",
            Mode::Write => "write",
        }
    }
}

/// Reader/writer lock with per-mode contention counters
pub struct ReadWriteLock {
    raw: parking_lot::RawRwLock,
    /// Thread token of the writer, 0 when not write locked
    write_owner: AtomicUsize,
    /// Read holders currently inside
    readers: AtomicUsize,
    read_busy: Counter,
    read_spin: Counter,
    write_busy: Counter,
    write_spin: Counter,
    downgraded: Counter,
    debugging: AtomicBool,
    spin_limit: u32,
}

impl ReadWriteLock {
    pub fn new() -> Self {
        Self::with_spin_limit(DEFAULT_SPIN_LIMIT)
    }

    pub fn with_spin_limit(spin_limit: u32) -> Self {
        ReadWriteLock {
            raw: parking_lot::RawRwLock::INIT,
            write_owner: AtomicUsize::new(0),
            readers: AtomicUsize::new(0),
            read_busy: Counter::new(),
            read_spin: Counter::new(),
            write_busy: Counter::new(),
            write_spin: Counter::new(),
            downgraded: Counter::new(),
            debugging: AtomicBool::new(false),
            spin_limit,
        }
    }

    /// Acquire according to `strategy` and report what was obtained
    ///
    /// Blocking strategies never return `LockLevel::Unlocked`.
    pub fn acquire(&self, strategy: LockStrategy) -> LockLevel {
        match strategy {
            LockStrategy::ForReading => {
                self.block(Mode::Read);
                LockLevel::Read
            }
            LockStrategy::ForWriting => {
                self.block(Mode::Write);
                LockLevel::Write
            }
            LockStrategy::TryForReading => self.attempt(Mode::Read),
            LockStrategy::TryForWriting => self.attempt(Mode::Write),
            LockStrategy::TryForWritingThenForReading => match self.attempt(Mode::Write) {
                LockLevel::Write => LockLevel::Write,
                _ => {
                    self.block(Mode::Read);
                    LockLevel::Read
                }
            },
            LockStrategy::TryForWritingThenTryForReading => match self.attempt(Mode::Write) {
                LockLevel::Write => LockLevel::Write,
                _ => self.attempt(Mode::Read),
            },
        }
    }

    /// Same as `write_lock`
    #[inline]
    pub fn lock(&self) -> bool {
        self.write_lock()
    }

    #[inline]
    pub fn read_lock(&self) -> bool {
        self.acquire(LockStrategy::ForReading).is_locked()
    }

    #[inline]
    pub fn write_lock(&self) -> bool {
        self.acquire(LockStrategy::ForWriting).is_locked()
    }

    #[inline]
    pub fn try_read_lock(&self) -> bool {
        self.acquire(LockStrategy::TryForReading).is_locked()
    }

    #[inline]
    pub fn try_write_lock(&self) -> bool {
        self.acquire(LockStrategy::TryForWriting).is_locked()
    }

    /// Release whichever mode the calling thread holds
    ///
    /// Panics when the caller holds nothing. A stray unlock while some
    /// other thread holds a read lock cannot be told apart from a real
    /// reader and releases that reader's share.
    #[inline]
    pub fn unlock(&self) {
        fast_read_write_unlock(self)
    }

    /// Turn the caller's write lock into a read lock with no gap between
    ///
    /// Panics if the calling thread is not the writer.
    pub fn downgrade(&self) {
        if self.write_owner.load(Ordering::Acquire) != current_thread_token() {
            misuse("downgrade without holding the write lock");
        }
        self.readers.fetch_add(1, Ordering::AcqRel);
        self.write_owner.store(0, Ordering::Release);
        // Safety: the calling thread holds the exclusive lock (checked above)
        unsafe { self.raw.downgrade() };
        self.downgraded.increment();
        if self.is_debugging() {
            log::debug!(target: "rksync::rwlock", "{:p} downgraded write -> read", self);
        }
    }

    /// Whether any thread holds the write lock
    #[inline]
    pub fn is_write_locked(&self) -> bool {
        self.write_owner.load(Ordering::Acquire) != 0
    }

    /// Blocking read guard
    pub fn read(&self) -> ReadGuard<'_> {
        self.block(Mode::Read);
        ReadGuard { lock: self, _not_send: PhantomData }
    }

    /// Blocking write guard
    pub fn write(&self) -> WriteGuard<'_> {
        self.block(Mode::Write);
        WriteGuard { lock: self, _not_send: PhantomData }
    }

    pub fn try_read(&self) -> Option<ReadGuard<'_>> {
        self.attempt(Mode::Read)
            .is_locked()
            .then(|| ReadGuard { lock: self, _not_send: PhantomData })
    }

    pub fn try_write(&self) -> Option<WriteGuard<'_>> {
        self.attempt(Mode::Write)
            .is_locked()
            .then(|| WriteGuard { lock: self, _not_send: PhantomData })
    }

    pub fn set_debug(&self, enable: bool) {
        self.debugging.store(enable, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_debugging(&self) -> bool {
        self.debugging.load(Ordering::Relaxed)
    }

    pub fn read_busy_count(&self) -> usize {
        self.read_busy.get()
    }

    pub fn read_spin_count(&self) -> usize {
        self.read_spin.get()
    }

    pub fn write_busy_count(&self) -> usize {
        self.write_busy.get()
    }

    pub fn write_spin_count(&self) -> usize {
        self.write_spin.get()
    }

    pub fn read_downgraded_from_write_count(&self) -> usize {
        self.downgraded.get()
    }

    /// Always zero: the underlying lock has no failing operations
    pub fn spurious_errors_count(&self) -> usize {
        0
    }

    /// Zero every counter.
    ///
    /// Only safe while no other thread is locking or unlocking.
    pub fn clear_counters(&self) {
        self.read_busy.reset();
        self.read_spin.reset();
        self.write_busy.reset();
        self.write_spin.reset();
        self.downgraded.reset();
    }

    fn counters(&self, mode: Mode) -> (&Counter, &Counter) {
        match mode {
            Mode::Read => (&self.read_busy, &self.read_spin),
            Mode::Write => (&self.write_busy, &self.write_spin),
        }
    }

    fn raw_try(&self, mode: Mode) -> bool {
        match mode {
            Mode::Read => self.raw.try_lock_shared(),
            Mode::Write => self.raw.try_lock_exclusive(),
        }
    }

    fn raw_try_for(&self, mode: Mode) -> bool {
        match mode {
            Mode::Read => self.raw.try_lock_shared_for(WAIT_SLICE),
            Mode::Write => self.raw.try_lock_exclusive_for(WAIT_SLICE),
        }
    }

    /// Record the caller as holder of `mode` after the raw lock was taken
    fn acquired(&self, mode: Mode) {
        match mode {
            Mode::Read => {
                self.readers.fetch_add(1, Ordering::AcqRel);
            }
            Mode::Write => self.write_owner.store(current_thread_token(), Ordering::Release),
        }
    }

    fn attempt(&self, mode: Mode) -> LockLevel {
        if self.raw_try(mode) {
            self.acquired(mode);
            return level(mode);
        }
        let (busy, _) = self.counters(mode);
        busy.increment();
        if self.is_debugging() {
            log::debug!(target: "rksync::rwlock", "{:p} {} try failed", self, mode.name());
        }
        LockLevel::Unlocked
    }

    fn block(&self, mode: Mode) {
        if self.raw_try(mode) {
            self.acquired(mode);
            return;
        }

        let (busy, spin) = self.counters(mode);
        busy.increment();
        if self.is_debugging() {
            log::debug!(target: "rksync::rwlock", "{:p} {} busy", self, mode.name());
        }

        for i in 0..self.spin_limit {
            spin.increment();
            if i < PAUSE_SPINS {
                core::hint::spin_loop();
            } else {
                thread_yield();
            }
            if self.raw_try(mode) {
                self.acquired(mode);
                return;
            }
        }

        while !self.raw_try_for(mode) {
            spin.increment();
            if self.is_debugging() {
                log::debug!(target: "rksync::rwlock", "{:p} {} still waiting", self, mode.name());
            }
        }
        self.acquired(mode);
    }
}

fn level(mode: Mode) -> LockLevel {
    match mode {
        Mode::Read => LockLevel::Read,
        Mode::Write => LockLevel::Write,
    }
}

#[track_caller]
fn misuse(what: &str) -> ! {
    log::error!("ReadWriteLock: {}", what);
    panic!("ReadWriteLock: {}", what);
}

impl Default for ReadWriteLock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ReadWriteLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadWriteLock")
            .field("write_locked", &self.is_write_locked())
            .field("readers", &self.readers.load(Ordering::Relaxed))
            .field("read_busy", &self.read_busy_count())
            .field("write_busy", &self.write_busy_count())
            .field("downgraded", &self.read_downgraded_from_write_count())
            .finish()
    }
}

impl Locking for ReadWriteLock {
    fn lock(&self) -> bool {
        self.write_lock()
    }

    fn unlock(&self) {
        fast_read_write_unlock(self)
    }
}

/// Blocking acquisition in the requested mode
pub fn fast_read_write_lock(lock: &ReadWriteLock, for_writing: bool) -> bool {
    let strategy = if for_writing {
        LockStrategy::ForWriting
    } else {
        LockStrategy::ForReading
    };
    lock.acquire(strategy).is_locked()
}

/// Release whichever mode the calling thread holds on `lock`
pub fn fast_read_write_unlock(lock: &ReadWriteLock) {
    let me = current_thread_token();
    if lock
        .write_owner
        .compare_exchange(me, 0, Ordering::AcqRel, Ordering::Acquire)
        .is_ok()
    {
        // Safety: the calling thread was recorded as the exclusive holder
        unsafe { lock.raw.unlock_exclusive() };
        return;
    }

    let released = lock
        .readers
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    if released.is_err() {
        misuse("unlock without holding the lock");
    }
    // Safety: a read share was outstanding (counted above)
    unsafe { lock.raw.unlock_shared() };
}

/// Shared access until dropped
pub struct ReadGuard<'a> {
    lock: &'a ReadWriteLock,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        fast_read_write_unlock(self.lock);
    }
}

/// Exclusive access until dropped or downgraded
pub struct WriteGuard<'a> {
    lock: &'a ReadWriteLock,
    _not_send: PhantomData<*const ()>,
}

impl<'a> WriteGuard<'a> {
    /// Keep holding the lock, for reading only
    pub fn downgrade(self) -> ReadGuard<'a> {
        let lock = self.lock;
        core::mem::forget(self);
        lock.downgrade();
        ReadGuard { lock, _not_send: PhantomData }
    }
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        fast_read_write_unlock(self.lock);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::Instant;

    /// Hold `lock` in `strategy` on another thread until the returned
    /// barrier is passed
    fn hold_elsewhere(lock: &Arc<ReadWriteLock>, strategy: LockStrategy) -> (Arc<Barrier>, thread::JoinHandle<()>) {
        let held = Arc::new(Barrier::new(2));
        let release = Arc::new(Barrier::new(2));
        let handle = {
            let (lock, held, release) = (Arc::clone(lock), Arc::clone(&held), Arc::clone(&release));
            thread::spawn(move || {
                assert!(lock.acquire(strategy).is_locked());
                held.wait();
                release.wait();
                lock.unlock();
            })
        };
        held.wait();
        (release, handle)
    }

    #[test]
    fn test_uncontended_strategies() {
        let lock = ReadWriteLock::new();
        let expected = [
            LockLevel::Read,
            LockLevel::Write,
            LockLevel::Read,
            LockLevel::Write,
            LockLevel::Write,
            LockLevel::Write,
        ];
        for (strategy, want) in LockStrategy::ALL.into_iter().zip(expected) {
            assert_eq!(lock.acquire(strategy), want, "{:?}", strategy);
            assert_eq!(lock.is_write_locked(), want == LockLevel::Write);
            lock.unlock();
        }
        assert_eq!(lock.read_busy_count(), 0);
        assert_eq!(lock.write_busy_count(), 0);
    }

    #[test]
    fn test_lock_is_write() {
        let lock = ReadWriteLock::new();
        assert!(lock.lock());
        assert!(lock.is_write_locked());
        lock.unlock();
        assert!(!lock.is_write_locked());
    }

    #[test]
    fn test_try_fails_fast_against_writer() {
        let lock = Arc::new(ReadWriteLock::new());
        let (release, handle) = hold_elsewhere(&lock, LockStrategy::ForWriting);

        let start = Instant::now();
        assert_eq!(lock.acquire(LockStrategy::TryForReading), LockLevel::Unlocked);
        assert_eq!(lock.acquire(LockStrategy::TryForWriting), LockLevel::Unlocked);
        assert_eq!(lock.acquire(LockStrategy::TryForWritingThenTryForReading), LockLevel::Unlocked);
        assert!(start.elapsed() < Duration::from_secs(1));

        assert_eq!(lock.read_busy_count(), 2);
        assert_eq!(lock.write_busy_count(), 2);

        release.wait();
        handle.join().unwrap();
    }

    #[test]
    fn test_write_then_read_fallback() {
        let lock = Arc::new(ReadWriteLock::new());
        let (release, handle) = hold_elsewhere(&lock, LockStrategy::ForReading);

        assert_eq!(lock.acquire(LockStrategy::TryForWritingThenTryForReading), LockLevel::Read);
        lock.unlock();
        assert_eq!(lock.acquire(LockStrategy::TryForWritingThenForReading), LockLevel::Read);
        lock.unlock();
        assert_eq!(lock.write_busy_count(), 2);

        release.wait();
        handle.join().unwrap();
    }

    #[test]
    fn test_downgrade() {
        let lock = Arc::new(ReadWriteLock::new());
        let guard = lock.write();
        assert!(lock.is_write_locked());

        let read = guard.downgrade();
        assert!(!lock.is_write_locked());
        assert_eq!(lock.read_downgraded_from_write_count(), 1);

        let other = Arc::clone(&lock);
        let (can_read, can_write) = thread::spawn(move || {
            let r = other.try_read_lock();
            if r {
                other.unlock();
            }
            (r, other.try_write_lock())
        })
        .join()
        .unwrap();
        assert!(can_read);
        assert!(!can_write);

        drop(read);
        assert!(lock.try_write_lock());
        lock.unlock();
    }

    #[test]
    #[should_panic(expected = "ReadWriteLock")]
    fn test_unlock_unheld_panics() {
        let lock = ReadWriteLock::new();
        lock.unlock();
    }

    #[test]
    #[should_panic(expected = "downgrade")]
    fn test_downgrade_without_write_panics() {
        let lock = ReadWriteLock::new();
        lock.read_lock();
        lock.downgrade();
    }

    #[test]
    fn test_blocked_writer_counts_busy() {
        let lock = Arc::new(ReadWriteLock::with_spin_limit(2));
        let (release, handle) = hold_elsewhere(&lock, LockStrategy::ForReading);

        let writer = {
            let lock = Arc::clone(&lock);
            thread::spawn(move || {
                lock.write_lock();
                lock.unlock();
            })
        };
        while lock.write_busy_count() == 0 {
            thread::yield_now();
        }
        thread::sleep(Duration::from_millis(30));
        release.wait();
        handle.join().unwrap();
        writer.join().unwrap();

        assert_eq!(lock.write_busy_count(), 1);
        assert!(lock.write_spin_count() >= 2);

        lock.clear_counters();
        assert_eq!(lock.write_spin_count(), 0);
    }

    #[test]
    fn test_fast_helpers() {
        let lock = ReadWriteLock::new();
        assert!(fast_read_write_lock(&lock, false));
        assert!(fast_read_write_lock(&lock, false));
        fast_read_write_unlock(&lock);
        fast_read_write_unlock(&lock);
        assert!(fast_read_write_lock(&lock, true));
        assert!(lock.is_write_locked());
        fast_read_write_unlock(&lock);
    }
}
