//! Locking protocol
//!
//! Both lock types implement `Locking`, so a collaborator guarding a
//! shared cache can be written against either.

/// Blocking lock/unlock pair
pub trait Locking: Send + Sync {
    /// Block until the lock is held; `true` once acquired
    fn lock(&self) -> bool;

    /// Release the lock held by the calling thread
    ///
    /// Releasing a lock the caller does not hold is a programming error
    /// and panics.
    fn unlock(&self);

    /// Run `f` while holding the lock
    fn with_lock<R>(&self, f: impl FnOnce() -> R) -> R
    where
        Self: Sized,
    {
        struct Release<'a, L: Locking>(&'a L);
        impl<L: Locking> Drop for Release<'_, L> {
            fn drop(&mut self) {
                self.0.unlock();
            }
        }

        self.lock();
        let _release = Release(self);
        f()
    }
}
