//! futex parking
//!
//! The futex word is 1 while a signal is pending and 0 otherwise. A parker
//! consumes a pending signal before sleeping, so a wake that lands between
//! the parked-count increment and `FUTEX_WAIT` is not missed.

use super::Parking;
use nix::errno::Errno;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

pub struct FutexParking {
    word: AtomicU32,
    parked: AtomicUsize,
}

impl FutexParking {
    pub fn new() -> Self {
        FutexParking {
            word: AtomicU32::new(0),
            parked: AtomicUsize::new(0),
        }
    }

    /// Sleep while the word is 0; `Ok(())` on FUTEX_WAKE
    fn futex_wait(&self, timeout: Option<Duration>) -> Result<(), Errno> {
        let ts = timeout.map(|d| libc::timespec {
            tv_sec: d.as_secs() as libc::time_t,
            tv_nsec: d.subsec_nanos() as libc::c_long,
        });
        let ts_ptr = ts
            .as_ref()
            .map_or(std::ptr::null(), |t| t as *const libc::timespec);

        // Safety: word outlives the call; ts_ptr is null or points at ts
        let rc = unsafe {
            libc::syscall(
                libc::SYS_futex,
                self.word.as_ptr(),
                libc::FUTEX_WAIT | libc::FUTEX_PRIVATE_FLAG,
                0u32,
                ts_ptr,
                std::ptr::null::<u32>(),
                0u32,
            )
        };
        if rc == 0 {
            Ok(())
        } else {
            Err(Errno::last())
        }
    }

    fn signal(&self, count: i32) {
        if self.parked.load(Ordering::Acquire) == 0 {
            return;
        }
        self.word.store(1, Ordering::Release);
        // Safety: word outlives the call
        unsafe {
            libc::syscall(
                libc::SYS_futex,
                self.word.as_ptr(),
                libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG,
                count,
                std::ptr::null::<libc::timespec>(),
                std::ptr::null::<u32>(),
                0u32,
            );
        }
    }
}

impl Default for FutexParking {
    fn default() -> Self {
        Self::new()
    }
}

impl Parking for FutexParking {
    fn park(&self, timeout: Option<Duration>) -> bool {
        self.parked.fetch_add(1, Ordering::SeqCst);
        if self.word.swap(0, Ordering::AcqRel) != 0 {
            self.parked.fetch_sub(1, Ordering::SeqCst);
            return true;
        }

        let waited = match self.futex_wait(timeout) {
            Ok(()) => true,
            Err(Errno::ETIMEDOUT | Errno::EAGAIN | Errno::EINTR) => false,
            Err(e) => {
                log::warn!(target: "rksync::pool", "futex wait failed: {}", e);
                false
            }
        };
        // EAGAIN means a signal landed between the swap above and the wait
        let woken = self.word.swap(0, Ordering::AcqRel) != 0 || waited;
        self.parked.fetch_sub(1, Ordering::SeqCst);
        woken
    }

    fn wake_one(&self) {
        self.signal(1);
    }

    fn wake_all(&self) {
        self.signal(i32::MAX);
    }

    fn parked_count(&self) -> usize {
        self.parked.load(Ordering::Relaxed)
    }
}
