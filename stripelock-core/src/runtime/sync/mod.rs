mod lock;
mod lock_manager;
mod owner_registry;

pub use lock::StripedLock;
pub use lock_manager::LockManager;
pub use owner_registry::OwnerRegistry;
