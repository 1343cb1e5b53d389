use std::str::FromStr;

use strum_macros::{AsRefStr, EnumIter, EnumString};

use crate::prelude::*;

/// Granularity of a wait duration handed to `try_lock`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumString, EnumIter, AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeUnit {
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    const NANOS_PER_MILLI: i64 = 1_000_000;
    const MICROS_PER_MILLI: i64 = 1_000;

    /// Converts `duration` in this unit to milliseconds. Sub-millisecond units truncate toward
    /// zero, coarser units saturate at `i64::MIN`/`i64::MAX`.
    pub fn to_millis(self, duration: i64) -> i64 {
        match self {
            TimeUnit::Nanoseconds => duration / Self::NANOS_PER_MILLI,
            TimeUnit::Microseconds => duration / Self::MICROS_PER_MILLI,
            TimeUnit::Milliseconds => duration,
            TimeUnit::Seconds => duration.saturating_mul(1_000),
            TimeUnit::Minutes => duration.saturating_mul(60 * 1_000),
            TimeUnit::Hours => duration.saturating_mul(60 * 60 * 1_000),
            TimeUnit::Days => duration.saturating_mul(24 * 60 * 60 * 1_000),
        }
    }

    pub fn of(unit: &str) -> LockResult<TimeUnit> {
        TimeUnit::from_str(unit.trim())
            .map_err(|_| ErrorCode::IllegalArgument(format!("unknown time unit: {}", unit)))
    }
}
