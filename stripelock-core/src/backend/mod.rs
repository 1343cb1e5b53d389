mod memory_backend;
mod redis_backend;

pub use memory_backend::MemoryLockBackend;
pub use redis_backend::RedisLockBackend;
use stripelock_common::prelude::*;

/// Key-value store a `LockManager` coordinates through. Every operation must be atomic at the
/// store; no multi-key transactions are required.
pub trait LockBackend: Send + Sync {
    /// `SET key value PX ttl_ms NX`: creates `key` with a TTL only if it does not exist.
    /// Returns whether the create happened.
    fn set_if_absent(&self, key: &str, value: &str, ttl_ms: i64) -> LockResult<bool>;

    /// `GET key`.
    fn get(&self, key: &str) -> LockResult<Option<String>>;

    /// `DEL key`. Deleting an absent key is not an error.
    fn delete(&self, key: &str) -> LockResult<()>;
}

impl<B: LockBackend + ?Sized> LockBackend for Arc<B> {
    fn set_if_absent(&self, key: &str, value: &str, ttl_ms: i64) -> LockResult<bool> {
        (**self).set_if_absent(key, value, ttl_ms)
    }

    fn get(&self, key: &str) -> LockResult<Option<String>> {
        (**self).get(key)
    }

    fn delete(&self, key: &str) -> LockResult<()> {
        (**self).delete(key)
    }
}
