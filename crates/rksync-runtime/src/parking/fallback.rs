//! Condvar parking for platforms without futex

use super::Parking;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub struct CondvarParking {
    pending: Mutex<bool>,
    cond: Condvar,
    parked: AtomicUsize,
}

impl CondvarParking {
    pub fn new() -> Self {
        CondvarParking {
            pending: Mutex::new(false),
            cond: Condvar::new(),
            parked: AtomicUsize::new(0),
        }
    }
}

impl Default for CondvarParking {
    fn default() -> Self {
        Self::new()
    }
}

impl Parking for CondvarParking {
    fn park(&self, timeout: Option<Duration>) -> bool {
        let mut pending = self.pending.lock();
        self.parked.fetch_add(1, Ordering::SeqCst);
        if !*pending {
            match timeout {
                Some(d) => {
                    self.cond.wait_for(&mut pending, d);
                }
                None => self.cond.wait(&mut pending),
            }
        }
        self.parked.fetch_sub(1, Ordering::SeqCst);
        std::mem::replace(&mut *pending, false)
    }

    fn wake_one(&self) {
        let mut pending = self.pending.lock();
        if self.parked.load(Ordering::Acquire) == 0 {
            return;
        }
        *pending = true;
        self.cond.notify_one();
    }

    fn wake_all(&self) {
        let mut pending = self.pending.lock();
        if self.parked.load(Ordering::Acquire) == 0 {
            return;
        }
        *pending = true;
        self.cond.notify_all();
    }

    fn parked_count(&self) -> usize {
        self.parked.load(Ordering::Relaxed)
    }
}
