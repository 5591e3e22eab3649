//! Timestamp utilities

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert milliseconds to duration
pub fn millis_to_duration(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

/// Age of a timestamp relative to now, clamped at zero for timestamps in the future
pub fn age_of(timestamp: DateTime<Utc>) -> Duration {
    (now() - timestamp).to_std().unwrap_or(Duration::ZERO)
}
