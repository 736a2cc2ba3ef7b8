//! Millisecond conversions for log fields and timeout errors.

use std::time::{Duration, Instant};

/// Whole milliseconds in `d`, saturating at `u64::MAX`.
pub fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

pub fn elapsed_ms(since: Instant) -> u64 {
    millis(since.elapsed())
}
