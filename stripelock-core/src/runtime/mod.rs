mod sync;

pub use sync::{LockManager, OwnerRegistry, StripedLock};
