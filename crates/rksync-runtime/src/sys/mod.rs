//! Raw OS mutex
//!
//! `RawMutex` is the one primitive `ExclusiveLock` is built on. Every
//! operation reports failures as `PrimitiveError` so the lock can tell a
//! retryable hiccup from caller misuse.

use rksync_core::PrimitiveError;

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod pthread;
        pub use pthread::RawMutex;
    } else {
        mod fallback;
        pub use fallback::RawMutex;
    }
}

thread_local! {
    static THREAD_TOKEN: u8 = const { 0 };
}

/// Non-zero value unique to the calling thread while it is alive
#[inline]
pub fn current_thread_token() -> usize {
    THREAD_TOKEN.with(|t| t as *const u8 as usize)
}

/// Human-readable description of a primitive failure
pub fn describe(err: &PrimitiveError) -> String {
    #[cfg(unix)]
    {
        let errno = nix::errno::Errno::from_raw(err.code());
        format!("{} [{}]", err, errno)
    }
    #[cfg(not(unix))]
    {
        err.to_string()
    }
}
