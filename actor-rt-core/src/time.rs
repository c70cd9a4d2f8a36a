//! Millisecond timestamp helpers, centralized so replay stays deterministic
//! (the engine never calls `SystemTime::now()` directly during replay).

use chrono::Utc;

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
