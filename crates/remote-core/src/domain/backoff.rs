//! Reconnect backoff policy for the transport link.
//!
//! The delay before reconnect attempt `n` (1-based) is
//!
//! ```text
//! delay(n) = min(base × 2^min(n - 1, 4), cap)
//! ```
//!
//! so with the default 5 s base the sequence is 5, 10, 20, 40, 60, 60, ...
//! Attempts never stop; a successful connect resets the counter.

use std::time::Duration;

/// Default delay before the first reconnect attempt.
pub const DEFAULT_BASE: Duration = Duration::from_secs(5);
/// Default upper bound on any single delay.
pub const DEFAULT_CAP: Duration = Duration::from_secs(60);
/// Exponent ceiling: the multiplier stops growing after 2^4.
const MAX_DOUBLINGS: u32 = 4;

/// Exponential backoff without jitter.
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    base: Duration,
    cap: Duration,
    attempt: u32,
}

impl ReconnectBackoff {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap,
            attempt: 0,
        }
    }

    /// Delay for a given 1-based attempt number.  Attempt 0 is treated as 1.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let doublings = attempt.saturating_sub(1).min(MAX_DOUBLINGS);
        self.base
            .checked_mul(1 << doublings)
            .map_or(self.cap, |d| d.min(self.cap))
    }

    /// Counts a failed attempt and returns how long to wait before the next.
    pub fn next_delay(&mut self) -> Duration {
        self.attempt = self.attempt.saturating_add(1);
        self.delay_for(self.attempt)
    }

    /// Number of consecutive failures since the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Called after a successful connect.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self::new(DEFAULT_BASE, DEFAULT_CAP)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
