use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch, matching the wire and on-disk
/// timestamp format used throughout the service.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_millis() as u64
}
