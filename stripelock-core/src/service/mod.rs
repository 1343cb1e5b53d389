mod lock_service;

pub use lock_service::LockService;
