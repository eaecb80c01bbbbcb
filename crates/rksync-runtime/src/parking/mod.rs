//! Submitter parking
//!
//! A caller of `ThreadPool::submit` that finds no idle worker parks here
//! until a worker returns to the idle queue. Workers call `wake_one()`
//! after re-queueing themselves; teardown calls `wake_all()`.

use std::time::Duration;

/// Sleep/wake point for threads waiting on pool capacity
pub trait Parking: Send + Sync {
    /// Park until signalled or `timeout` elapses.
    ///
    /// `true` when woken by a signal. Callers re-check their condition
    /// either way: a signal sent while nobody is parked is not queued.
    fn park(&self, timeout: Option<Duration>) -> bool;

    fn wake_one(&self);

    fn wake_all(&self);

    /// Threads currently parked (hint, may be stale)
    fn parked_count(&self) -> usize;
}

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        mod futex_linux;
        pub use futex_linux::FutexParking as PlatformParking;
    } else {
        mod fallback;
        pub use fallback::CondvarParking as PlatformParking;
    }
}

/// Parking for the current platform
pub fn new_parking() -> Box<dyn Parking> {
    Box::new(PlatformParking::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_park_times_out() {
        let parking = new_parking();
        let start = Instant::now();
        let signalled = parking.park(Some(Duration::from_millis(30)));
        assert!(!signalled);
        assert!(start.elapsed() >= Duration::from_millis(25));
        assert_eq!(parking.parked_count(), 0);
    }

    #[test]
    fn test_wake_one_releases_parked() {
        let parking = Arc::new(PlatformParking::new());
        let parked = {
            let parking = Arc::clone(&parking);
            thread::spawn(move || parking.park(Some(Duration::from_secs(10))))
        };

        while parking.parked_count() == 0 {
            thread::yield_now();
        }
        let start = Instant::now();
        parking.wake_one();
        assert!(parked.join().unwrap());
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_wake_without_waiters_is_dropped() {
        let parking = PlatformParking::new();
        parking.wake_all();
        assert!(!parking.park(Some(Duration::from_millis(10))));
    }
}
