//! Wall-clock timestamps in milliseconds since the Unix epoch.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current time in ms since epoch. Saturates to 0 on a pre-epoch clock.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
