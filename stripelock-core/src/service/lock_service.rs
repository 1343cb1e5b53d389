use stripelock_common::prelude::*;

use crate::backend::LockBackend;
use crate::config::LockProperties;
use crate::metrics::Monitors;
use crate::runtime::{LockManager, StripedLock};

pub struct LockService<L: StripedLock> {
    lock: L,
    properties: LockProperties,
}

impl<B: LockBackend> LockService<LockManager<B>> {
    pub fn from_manager(manager: LockManager<B>) -> Self {
        let properties = manager.properties().clone();
        Self::new(manager, properties)
    }
}

impl<L: StripedLock> LockService<L> {
    pub fn new(lock: L, properties: LockProperties) -> Self {
        Self { lock, properties }
    }

    pub fn lock(&self) -> &L {
        &self.lock
    }

    /// Tries to acquire the lock within the configured `lock_time_to_try_ms`, without blocking
    /// indefinitely. Callers that find the resource busy are expected to come back later rather
    /// than queue up.
    pub fn acquire_lock(&self, lock_id: &str) -> LockResult<bool> {
        self.acquire_lock_try_time(lock_id, self.properties.lock_time_to_try_ms)
    }

    pub fn acquire_lock_try_time(&self, lock_id: &str, time_to_try_ms: i64) -> LockResult<bool> {
        if !self.properties.lock_enabled {
            return Ok(true);
        }
        if !self
            .lock
            .try_lock(lock_id, time_to_try_ms, TimeUnit::Milliseconds)?
        {
            debug!(
                "Thread {:?} failed to acquire lock to lockId {}.",
                std::thread::current().id(),
                lock_id
            );
            Monitors::record_acquire_lock_unsuccessful();
            return Ok(false);
        }
        debug!(
            "Thread {:?} acquired lock to lockId {}.",
            std::thread::current().id(),
            lock_id
        );
        Ok(true)
    }

    pub fn release_lock(&self, lock_id: &str) -> LockResult<()> {
        if self.properties.lock_enabled {
            self.lock.unlock(lock_id)?;
            debug!(
                "Thread {:?} released lock to lockId {}.",
                std::thread::current().id(),
                lock_id
            );
        }
        Ok(())
    }

    pub fn delete_lock(&self, lock_id: &str) -> LockResult<()> {
        if self.properties.lock_enabled {
            self.lock.force_unlock(lock_id)?;
            debug!(
                "Thread {:?} deleted lockId {}.",
                std::thread::current().id(),
                lock_id
            );
        }
        Ok(())
    }

    /// Runs `f` while holding `lock_id`. `Ok(None)` when the lock could not be acquired in time.
    ///
    /// The lock is released when `f` returns or unwinds. A failed release is logged and counted
    /// but does not discard `f`'s result; the lease bounds how long the record can linger.
    pub fn with_lock<R>(&self, lock_id: &str, f: impl FnOnce() -> R) -> LockResult<Option<R>> {
        if !self.acquire_lock(lock_id)? {
            return Ok(None);
        }
        let _guard = ReleaseOnDrop {
            service: self,
            lock_id,
        };
        Ok(Some(f()))
    }
}

struct ReleaseOnDrop<'a, L: StripedLock> {
    service: &'a LockService<L>,
    lock_id: &'a str,
}

impl<L: StripedLock> Drop for ReleaseOnDrop<'_, L> {
    fn drop(&mut self) {
        if let Err(e) = self.service.release_lock(self.lock_id) {
            Monitors::record_backend_error("release");
            error!("error occur when releasing lockId {}, err={}", self.lock_id, e);
        }
    }
}
