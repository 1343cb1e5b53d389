use redis::{Client, Cmd, Connection, FromRedisValue, RedisError};
use stripelock_common::prelude::*;

use super::LockBackend;
use crate::config::LockProperties;

/// Redis (or any RESP-compatible server) backend. Commands are issued over a single connection
/// guarded by a mutex; a connection that turns out broken is dropped and re-opened on the next
/// command.
///
/// Every step is bounded by `timeout`: connecting, each read and write on the socket, and waiting
/// for the connection mutex while another thread has a command in flight.
pub struct RedisLockBackend {
    client: Client,
    timeout: Duration,
    connection: Mutex<Option<Connection>>,
}

impl RedisLockBackend {
    pub fn open(url: &str) -> LockResult<Self> {
        Self::open_with_timeout(url, LockProperties::default().redis_timeout())
    }

    pub fn open_with_timeout(url: &str, timeout: Duration) -> LockResult<Self> {
        if timeout.is_zero() {
            return str_err!(Configuration, "redis timeout must be positive");
        }
        let client = Client::open(url).map_err(|e| backend_error("open", url, e))?;
        Ok(Self {
            client,
            timeout,
            connection: Mutex::new(None),
        })
    }

    pub fn from_properties(properties: &LockProperties) -> LockResult<Self> {
        properties.validate()?;
        Self::open_with_timeout(&properties.redis_url, properties.redis_timeout())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn connect(&self, key: &str) -> LockResult<Connection> {
        let connection = self
            .client
            .get_connection_with_timeout(self.timeout)
            .map_err(|e| backend_error("connect", key, e))?;
        connection
            .set_read_timeout(Some(self.timeout))
            .map_err(|e| backend_error("connect", key, e))?;
        connection
            .set_write_timeout(Some(self.timeout))
            .map_err(|e| backend_error("connect", key, e))?;
        Ok(connection)
    }

    fn execute<T: FromRedisValue>(&self, cmd: &Cmd, key: &str) -> LockResult<T> {
        let Some(mut guard) = self.connection.try_lock_for(self.timeout) else {
            return fmt_err!(
                Backend,
                "redis connection busy for more than {:?}, key={}",
                self.timeout,
                key
            );
        };
        if guard.is_none() {
            *guard = Some(self.connect(key)?);
        }

        let result = match guard.as_mut() {
            Some(connection) => cmd.query::<T>(connection),
            None => return fmt_err!(Backend, "no redis connection for key {}", key),
        };

        result.map_err(|e| {
            // A timed out reply may still arrive later and would be read as the answer to the
            // next command, so the connection is unusable from here on.
            if e.is_connection_dropped() || e.is_io_error() || e.is_timeout() {
                warn!("dropping broken redis connection, key={}, err={}", key, e);
                *guard = None;
            }
            backend_error("query", key, e)
        })
    }
}

impl LockBackend for RedisLockBackend {
    fn set_if_absent(&self, key: &str, value: &str, ttl_ms: i64) -> LockResult<bool> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value).arg("PX").arg(ttl_ms).arg("NX");
        // NX replies nil when the key already exists.
        let reply: Option<String> = self.execute(&cmd, key)?;
        Ok(reply.is_some())
    }

    fn get(&self, key: &str) -> LockResult<Option<String>> {
        let mut cmd = redis::cmd("GET");
        cmd.arg(key);
        self.execute(&cmd, key)
    }

    fn delete(&self, key: &str) -> LockResult<()> {
        let mut cmd = redis::cmd("DEL");
        cmd.arg(key);
        let _removed: i64 = self.execute(&cmd, key)?;
        Ok(())
    }
}

fn backend_error(op: &str, key: &str, error: RedisError) -> ErrorCode {
    ErrorCode::Backend(format!("redis {} failed, key={}: {}", op, key, error)).with_cause(error)
}
