use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use stripelock_common::prelude::*;

use super::{OwnerRegistry, StripedLock};
use crate::backend::LockBackend;
use crate::config::LockProperties;
use crate::metrics::Monitors;
use crate::model::LockRecord;
use crate::utils::IdGenerator;

enum Acquire {
    Acquired,
    TimedOut,
    Interrupted,
}

/// Distributed lock over a `LockBackend`.
///
/// A lock named `name` is the backend key `<keyPrefix><name>`, created with
/// `SET .. PX <maxLeaseTimeMs> NX` and holding a `LockRecord` whose `id` is a fresh token per
/// acquisition. The acquiring thread remembers that token in an `OwnerRegistry`; release and
/// ownership checks compare it with the stored record, so a thread never deletes a record that
/// it did not write.
pub struct LockManager<B: LockBackend> {
    backend: B,
    properties: LockProperties,
    owners: OwnerRegistry,
    // Dropping the sender disconnects `interrupt_rx` and wakes every sleeping acquirer.
    interrupt_tx: Mutex<Option<Sender<()>>>,
    interrupt_rx: Receiver<()>,
}

impl<B: LockBackend> LockManager<B> {
    pub fn new(backend: B) -> LockResult<Self> {
        Self::with_properties(backend, LockProperties::default())
    }

    pub fn with_properties(backend: B, properties: LockProperties) -> LockResult<Self> {
        properties.validate()?;
        let (interrupt_tx, interrupt_rx) = crossbeam_channel::bounded(0);
        Ok(Self {
            backend,
            properties,
            owners: OwnerRegistry::new(),
            interrupt_tx: Mutex::new(Some(interrupt_tx)),
            interrupt_rx,
        })
    }

    pub fn properties(&self) -> &LockProperties {
        &self.properties
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Waits at most `timeout_ms` milliseconds. A non-positive timeout makes a single attempt.
    pub fn try_lock_ms(&self, name: &str, timeout_ms: i64) -> LockResult<bool> {
        let timeout = Duration::from_millis(timeout_ms.max(0) as u64);
        match self.lock_inner(name, self.properties.max_lease_time_ms, Some(timeout)) {
            Acquire::Acquired => Ok(true),
            Acquire::TimedOut | Acquire::Interrupted => Ok(false),
        }
    }

    /// Interrupts every pending acquisition on this manager and refuses later ones without
    /// touching the backend. Release and ownership queries keep working.
    pub fn shutdown(&self) {
        if self.interrupt_tx.lock().take().is_some() {
            info!("lock manager shut down, pending acquisitions interrupted");
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.interrupt_tx.lock().is_none()
    }

    fn lock_key(&self, name: &str) -> String {
        format!("{}{}", self.properties.key_prefix, name)
    }

    /// `timeout` of `None` retries until the put succeeds or the manager is shut down.
    fn lock_inner(&self, name: &str, lease_ms: i64, timeout: Option<Duration>) -> Acquire {
        let lock_key = self.lock_key(name);
        let token = IdGenerator::generate_token();
        // The token must be visible to this thread before any put can succeed.
        let previous = self.owners.set(name, token);
        let outcome = self.acquire_with_token(&lock_key, lease_ms, timeout, token);

        if !matches!(outcome, Acquire::Acquired) {
            match previous {
                Some(previous) => {
                    self.owners.set(name, previous);
                }
                None => {
                    self.owners.remove(name);
                }
            }
        }
        outcome
    }

    fn acquire_with_token(
        &self,
        lock_key: &str,
        lease_ms: i64,
        timeout: Option<Duration>,
        token: uuid::Uuid,
    ) -> Acquire {
        let value = match LockRecord::new(token, IdGenerator::current_unit_id()).encode() {
            Ok(value) => value,
            Err(e) => {
                error!("error occur when encoding lock record, key={}, err={}", lock_key, e);
                return Acquire::Interrupted;
            }
        };
        debug!(
            "begin try lock, isTry={}, timeout={:?}, key={}",
            timeout.is_some(),
            timeout,
            lock_key
        );

        if self.is_shutdown() {
            info!("fail to lock cause by shutdown, key={}", lock_key);
            return Acquire::Interrupted;
        }

        let start = Instant::now();
        loop {
            match self.backend.set_if_absent(lock_key, &value, lease_ms) {
                Ok(true) => {
                    let waited = start.elapsed();
                    Monitors::record_acquire_wait_time(waited.as_secs_f64() * 1_000.0);
                    debug!("locked, key={}, value={}, waited={:?}", lock_key, value, waited);
                    return Acquire::Acquired;
                }
                Ok(false) => {}
                Err(e) => {
                    Monitors::record_backend_error("set_if_absent");
                    error!("error occur when lock, key={}, err={}", lock_key, e);
                }
            }

            if let Some(timeout) = timeout {
                if start.elapsed() >= timeout {
                    info!("fail to lock cause by timeout, key={}", lock_key);
                    return Acquire::TimedOut;
                }
            }

            if !self.pause() {
                info!("fail to lock cause by interrupt, key={}", lock_key);
                return Acquire::Interrupted;
            }
        }
    }

    /// Sleeps `retry_sleep_ms`. Returns false if the manager was shut down.
    fn pause(&self) -> bool {
        match self.interrupt_rx.recv_timeout(self.properties.retry_sleep()) {
            Err(RecvTimeoutError::Timeout) => true,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    fn current_lock(&self, name: &str) -> LockResult<Option<LockRecord>> {
        self.backend
            .get(&self.lock_key(name))?
            .map(|value| LockRecord::decode(&value))
            .transpose()
    }

    fn unlock_inner(&self, name: &str) -> LockResult<()> {
        self.backend.delete(&self.lock_key(name))
    }
}

impl<B: LockBackend> StripedLock for LockManager<B> {
    fn lock(&self, name: &str) -> LockResult<()> {
        match self.lock_inner(name, self.properties.max_lease_time_ms, None) {
            Acquire::Acquired => Ok(()),
            Acquire::TimedOut | Acquire::Interrupted => {
                fmt_err!(LockAcquisition, "error occur when lock, key={}", self.lock_key(name))
            }
        }
    }

    fn try_lock(&self, name: &str, duration: i64, unit: TimeUnit) -> LockResult<bool> {
        self.try_lock_ms(name, unit.to_millis(duration))
    }

    fn unlock(&self, name: &str) -> LockResult<()> {
        let Some(token) = self.owners.get(name) else {
            return Ok(());
        };
        match self.current_lock(name)? {
            Some(record) if record.id == token => {
                self.unlock_inner(name)?;
                self.owners.remove(name);
                debug!("unlocked, key={}", self.lock_key(name));
            }
            _ => {
                // Lease expired or force-released: the token can never match again.
                self.owners.remove(name);
                debug!("dropped stale ownership, key={}", self.lock_key(name));
            }
        }
        Ok(())
    }

    fn force_unlock(&self, name: &str) -> LockResult<()> {
        self.unlock_inner(name)?;
        debug!("force unlocked, key={}", self.lock_key(name));
        Ok(())
    }

    fn is_held_by_current_thread(&self, name: &str) -> LockResult<bool> {
        let Some(token) = self.owners.get(name) else {
            return Ok(false);
        };
        Ok(self
            .current_lock(name)?
            .map_or(false, |record| record.id == token))
    }
}
