//! Relay wire protocol: message types and the JSON text codec.

pub mod codec;
pub mod messages;

/// Returns the current wall-clock time as Unix epoch milliseconds.
///
/// Falls back to `0` if the system clock is set before 1970.
pub fn unix_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
