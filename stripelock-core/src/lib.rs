//! Distributed mutual exclusion over a key-value store with atomic `SET .. PX .. NX`.
//!
//! ```no_run
//! use stripelock_common::prelude::*;
//! use stripelock_core::{LockManager, RedisLockBackend, StripedLock};
//!
//! # fn main() -> LockResult<()> {
//! let manager = LockManager::new(RedisLockBackend::open("redis://127.0.0.1:6379/0")?)?;
//! if manager.try_lock("invoice-42", 500, TimeUnit::Milliseconds)? {
//!     // critical section
//!     manager.unlock("invoice-42")?;
//! }
//! # Ok(())
//! # }
//! ```

mod backend;
mod config;
mod metrics;
mod model;
mod runtime;
mod service;
mod utils;

pub use backend::{LockBackend, MemoryLockBackend, RedisLockBackend};
pub use config::LockProperties;
pub use crate::metrics::Monitors;
pub use model::LockRecord;
pub use runtime::{LockManager, OwnerRegistry, StripedLock};
pub use service::LockService;
pub use stripelock_common::TimeUnit;
pub use utils::IdGenerator;
