mod exception;
mod utils;

pub use utils::TimeUnit;

pub mod prelude;

#[macro_use]
pub(crate) mod macros;
