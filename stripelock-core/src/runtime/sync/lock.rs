use stripelock_common::prelude::*;

/// Interface implemented by a distributed lock client. Locks are striped by name: every name is
/// an independent lock.
pub trait StripedLock: Send + Sync {
    /// Blocks until the lock is acquired. Fails only when the wait is interrupted.
    fn lock(&self, name: &str) -> LockResult<()>;

    /// Waits at most `duration` for the lock. `Ok(false)` on timeout.
    fn try_lock(&self, name: &str, duration: i64, unit: TimeUnit) -> LockResult<bool>;

    /// Releases the lock if the calling thread holds it; no-op otherwise.
    fn unlock(&self, name: &str) -> LockResult<()>;

    /// Deletes the lock regardless of who holds it.
    fn force_unlock(&self, name: &str) -> LockResult<()>;

    fn is_held_by_current_thread(&self, name: &str) -> LockResult<bool>;
}

impl<L: StripedLock + ?Sized> StripedLock for Arc<L> {
    fn lock(&self, name: &str) -> LockResult<()> {
        (**self).lock(name)
    }

    fn try_lock(&self, name: &str, duration: i64, unit: TimeUnit) -> LockResult<bool> {
        (**self).try_lock(name, duration, unit)
    }

    fn unlock(&self, name: &str) -> LockResult<()> {
        (**self).unlock(name)
    }

    fn force_unlock(&self, name: &str) -> LockResult<()> {
        (**self).force_unlock(name)
    }

    fn is_held_by_current_thread(&self, name: &str) -> LockResult<bool> {
        (**self).is_held_by_current_thread(name)
    }
}
