//! pthread-backed raw mutex
//!
//! The mutex is created `PTHREAD_MUTEX_ERRORCHECK`, so relocking from the
//! owning thread and unlocking from a non-owner come back as errors
//! instead of deadlocking or corrupting the lock.

use rksync_core::PrimitiveError;
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;

/// OS mutex; boxed because a pthread mutex must not move once initialized
pub struct RawMutex {
    inner: Box<UnsafeCell<libc::pthread_mutex_t>>,
}

// Safety: pthread mutexes are designed to be shared between threads
unsafe impl Send for RawMutex {}
unsafe impl Sync for RawMutex {}

/// Map a pthread return code onto the error taxonomy
fn check(op: &'static str, code: libc::c_int) -> Result<(), PrimitiveError> {
    match code {
        0 => Ok(()),
        libc::EDEADLK | libc::EPERM | libc::EINVAL => Err(PrimitiveError::Misuse { op, code }),
        _ => Err(PrimitiveError::Spurious { op, code }),
    }
}

impl RawMutex {
    pub fn new() -> Result<Self, PrimitiveError> {
        let inner = Box::new(UnsafeCell::new(libc::PTHREAD_MUTEX_INITIALIZER));
        // Safety: attr is initialized before use and destroyed on every path;
        // inner is heap-pinned for the lifetime of the mutex.
        unsafe {
            let mut attr = MaybeUninit::<libc::pthread_mutexattr_t>::uninit();
            check("pthread_mutexattr_init", libc::pthread_mutexattr_init(attr.as_mut_ptr()))?;
            let mut rc = libc::pthread_mutexattr_settype(attr.as_mut_ptr(), libc::PTHREAD_MUTEX_ERRORCHECK);
            if rc == 0 {
                rc = libc::pthread_mutex_init(inner.get(), attr.as_ptr());
            }
            libc::pthread_mutexattr_destroy(attr.as_mut_ptr());
            check("pthread_mutex_init", rc)?;
        }
        Ok(RawMutex { inner })
    }

    /// Block until acquired
    #[inline]
    pub fn lock(&self) -> Result<(), PrimitiveError> {
        // Safety: inner was initialized in new() and is not destroyed until drop
        check("pthread_mutex_lock", unsafe { libc::pthread_mutex_lock(self.inner.get()) })
    }

    /// `Ok(false)` when another thread holds the mutex
    #[inline]
    pub fn try_lock(&self) -> Result<bool, PrimitiveError> {
        // Safety: as in lock()
        match unsafe { libc::pthread_mutex_trylock(self.inner.get()) } {
            libc::EBUSY => Ok(false),
            code => check("pthread_mutex_trylock", code).map(|_| true),
        }
    }

    #[inline]
    pub fn unlock(&self) -> Result<(), PrimitiveError> {
        // Safety: as in lock(); misuse is reported by the error-checking type
        check("pthread_mutex_unlock", unsafe { libc::pthread_mutex_unlock(self.inner.get()) })
    }
}

impl Drop for RawMutex {
    fn drop(&mut self) {
        // Safety: &mut self guarantees no other references remain
        let rc = unsafe { libc::pthread_mutex_destroy(self.inner.get()) };
        if rc != 0 {
            log::warn!("pthread_mutex_destroy returned {}", rc);
        }
    }
}
