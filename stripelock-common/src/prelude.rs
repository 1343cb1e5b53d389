#[rustfmt::skip]
pub use crate::exception::{ErrorCode, LockResult};
pub use crate::{fmt_err, str_err};

#[rustfmt::skip]
// std
pub use std::cell::RefCell;
pub use std::collections::HashMap;
pub use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
pub use std::sync::Arc;
pub use std::time::{Duration, Instant};

#[rustfmt::skip]
pub type InlineStr = smartstring::SmartString<smartstring::Compact>;
pub use parking_lot::Mutex;

#[rustfmt::skip]
pub use log::{debug, error, info, warn};

#[rustfmt::skip]
pub use crate::utils::TimeUnit;
