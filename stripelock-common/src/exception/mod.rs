#[allow(clippy::module_inception)]
mod exception;
mod exception_code;
mod exception_info;

pub use exception::{ErrorCode, LockResult};
