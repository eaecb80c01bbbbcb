//! Mutex + condition variable pair with a scoped guard
//!
//! Every worker slot and every job carries one. The guard releases the
//! mutex on every exit path, so a wait loop can return early or unwind
//! without leaving the slot locked.

use parking_lot::{Condvar, Mutex, MutexGuard};
use std::ops::{Deref, DerefMut};
use std::time::{Duration, Instant};

/// State of type `T` guarded by a mutex, with a condition to wait on
#[derive(Debug, Default)]
pub struct ConditionLock<T> {
    state: Mutex<T>,
    cond: Condvar,
}

impl<T> ConditionLock<T> {
    pub fn new(value: T) -> Self {
        ConditionLock {
            state: Mutex::new(value),
            cond: Condvar::new(),
        }
    }

    /// Lock the state
    pub fn lock(&self) -> ConditionGuard<'_, T> {
        ConditionGuard { owner: self, guard: self.state.lock() }
    }

    /// Lock the state once `ready` holds
    pub fn lock_when(&self, mut ready: impl FnMut(&T) -> bool) -> ConditionGuard<'_, T> {
        let mut guard = self.lock();
        guard.wait_while(|state| !ready(state));
        guard
    }

    /// `lock_when` giving up after `timeout`
    pub fn lock_when_timeout(
        &self,
        timeout: Duration,
        mut ready: impl FnMut(&T) -> bool,
    ) -> Option<ConditionGuard<'_, T>> {
        let mut guard = self.lock();
        if ready(&*guard) {
            return Some(guard);
        }
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            guard.wait_while(|state| !ready(state));
            return Some(guard);
        };
        while !ready(&*guard) {
            if self.cond.wait_until(&mut guard.guard, deadline).timed_out() {
                return ready(&*guard).then_some(guard);
            }
        }
        Some(guard)
    }

    pub fn notify_one(&self) -> bool {
        self.cond.notify_one()
    }

    pub fn notify_all(&self) -> usize {
        self.cond.notify_all()
    }

    /// Consume the lock and return the state
    pub fn into_inner(self) -> T {
        self.state.into_inner()
    }
}

/// Held condition lock; the mutex is released on drop
pub struct ConditionGuard<'a, T> {
    owner: &'a ConditionLock<T>,
    guard: MutexGuard<'a, T>,
}

impl<'a, T> ConditionGuard<'a, T> {
    /// Release the mutex, wait for a notification, reacquire
    pub fn wait(&mut self) {
        self.owner.cond.wait(&mut self.guard);
    }

    /// Wait until `condition` returns false
    pub fn wait_while(&mut self, mut condition: impl FnMut(&mut T) -> bool) {
        while condition(&mut *self.guard) {
            self.owner.cond.wait(&mut self.guard);
        }
    }

    /// Wait for a notification or `timeout`; `false` if it timed out
    pub fn wait_timeout(&mut self, timeout: Duration) -> bool {
        !self.owner.cond.wait_for(&mut self.guard, timeout).timed_out()
    }

    pub fn notify_one(&self) -> bool {
        self.owner.cond.notify_one()
    }

    pub fn notify_all(&self) -> usize {
        self.owner.cond.notify_all()
    }

    /// Store `value`, wake every waiter and release the mutex
    pub fn unlock_with(mut self, value: T) {
        *self.guard = value;
        self.owner.cond.notify_all();
    }
}

impl<T> Deref for ConditionGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for ConditionGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}
