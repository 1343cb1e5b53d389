use serde::Deserialize;
use stripelock_common::prelude::*;

#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LockProperties {
    /// Lease applied to every acquired lock. The backend evicts the record once it elapses,
    /// whether or not the holder released it.
    /// MILLISECONDS
    pub max_lease_time_ms: i64,
    /// Prepended to every lock name when addressing the backend.
    pub key_prefix: String,
    /// Pause between two acquisition attempts.
    /// MILLISECONDS
    pub retry_sleep_ms: i64,
    /// How long `LockService::acquire_lock` waits before giving up.
    /// MILLISECONDS
    pub lock_time_to_try_ms: i64,
    /// Used to enable/disable locking in `LockService`.
    pub lock_enabled: bool,
    pub redis_url: String,
    /// Bounds connecting to the backend and every read/write on the connection, so a stalled
    /// server turns into a failed attempt instead of a hung caller.
    /// MILLISECONDS
    pub redis_timeout_ms: i64,
}

impl LockProperties {
    pub const DEFAULT_KEY_PREFIX: &'static str = "lock:";

    pub fn validate(&self) -> LockResult<()> {
        if self.max_lease_time_ms <= 0 {
            return fmt_err!(
                Configuration,
                "maxLeaseTimeMs must be positive, got {}",
                self.max_lease_time_ms
            );
        }
        if self.retry_sleep_ms <= 0 {
            return fmt_err!(
                Configuration,
                "retrySleepMs must be positive, got {}",
                self.retry_sleep_ms
            );
        }
        if self.redis_timeout_ms <= 0 {
            return fmt_err!(
                Configuration,
                "redisTimeoutMs must be positive, got {}",
                self.redis_timeout_ms
            );
        }
        if self.lock_time_to_try_ms < 0 {
            return fmt_err!(
                Configuration,
                "lockTimeToTryMs must not be negative, got {}",
                self.lock_time_to_try_ms
            );
        }
        Ok(())
    }

    pub fn retry_sleep(&self) -> Duration {
        Duration::from_millis(self.retry_sleep_ms.max(0) as u64)
    }

    pub fn redis_timeout(&self) -> Duration {
        Duration::from_millis(self.redis_timeout_ms.max(1) as u64)
    }
}

impl Default for LockProperties {
    fn default() -> Self {
        Self {
            max_lease_time_ms: 60_000,
            key_prefix: Self::DEFAULT_KEY_PREFIX.to_string(),
            retry_sleep_ms: 10,
            lock_time_to_try_ms: 500,
            lock_enabled: true,
            redis_url: "redis://127.0.0.1:6379/0".to_string(),
            redis_timeout_ms: 1_000,
        }
    }
}

impl TryFrom<&serde_json::Value> for LockProperties {
    type Error = ErrorCode;
    fn try_from(value: &serde_json::Value) -> Result<Self, Self::Error> {
        if !value.is_object() {
            return str_err!(IllegalArgument, "lock properties must be a json object");
        }
        let properties: LockProperties = serde_json::from_value(value.clone())?;
        properties.validate()?;
        Ok(properties)
    }
}
