//! parking_lot-backed raw mutex
//!
//! Used on platforms without pthreads. Ownership is tracked by thread
//! token so the same misuse cases as the error-checking pthread mutex are
//! reported.

use super::current_thread_token;
use parking_lot::lock_api::RawMutex as _;
use rksync_core::PrimitiveError;
use std::sync::atomic::{AtomicUsize, Ordering};

const EPERM: i32 = 1;
const EDEADLK: i32 = 35;

pub struct RawMutex {
    raw: parking_lot::RawMutex,
    owner: AtomicUsize,
}

impl RawMutex {
    pub fn new() -> Result<Self, PrimitiveError> {
        Ok(RawMutex {
            raw: parking_lot::RawMutex::INIT,
            owner: AtomicUsize::new(0),
        })
    }

    pub fn lock(&self) -> Result<(), PrimitiveError> {
        let me = current_thread_token();
        if self.owner.load(Ordering::Relaxed) == me {
            return Err(PrimitiveError::Misuse { op: "mutex_lock", code: EDEADLK });
        }
        self.raw.lock();
        self.owner.store(me, Ordering::Relaxed);
        Ok(())
    }

    pub fn try_lock(&self) -> Result<bool, PrimitiveError> {
        if !self.raw.try_lock() {
            return Ok(false);
        }
        self.owner.store(current_thread_token(), Ordering::Relaxed);
        Ok(true)
    }

    pub fn unlock(&self) -> Result<(), PrimitiveError> {
        if self.owner.load(Ordering::Relaxed) != current_thread_token() {
            return Err(PrimitiveError::Misuse { op: "mutex_unlock", code: EPERM });
        }
        self.owner.store(0, Ordering::Relaxed);
        // Safety: the calling thread owns the lock (checked above)
        unsafe { self.raw.unlock() };
        Ok(())
    }
}
