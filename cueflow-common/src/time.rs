//! Timestamp utilities

use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert milliseconds to duration
pub fn millis_to_duration(millis: u64) -> std::time::Duration {
    std::time::Duration::from_millis(millis)
}

/// Whole minutes elapsed between `start` and `now`, truncating.
///
/// Callers only pass `start <= now`, so the result is non-negative.
pub fn elapsed_whole_minutes(start: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - start).num_seconds() / 60
}
