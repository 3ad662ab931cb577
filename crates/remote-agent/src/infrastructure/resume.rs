//! Suspend/resume detection.
//!
//! A sleeping machine stops running timers.  After resume the relay socket
//! is usually dead, but the heartbeat would take up to a minute to notice.
//! This watcher ticks on a short period and compares how much time really
//! passed against the period it asked for:
//!
//! - the wall clock keeps counting through a suspend on every platform;
//! - the monotonic clock does on some platforms and not on others.
//!
//! Whichever clock saw the larger jump is compared to the period.  A jump
//! beyond the tolerance is reported as a resume, which the agent feeds into
//! the link's debounced network-change reconnect.

use std::time::{Duration, Instant, SystemTime};

use tokio::task::JoinHandle;
use tracing::info;

pub const DEFAULT_PERIOD: Duration = Duration::from_secs(5);
pub const DEFAULT_TOLERANCE: Duration = Duration::from_secs(10);

/// Returns the unexplained gap if one tick took longer than `period` plus
/// `tolerance`.
///
/// `wall_elapsed` is `None` when the wall clock went backwards (manual
/// adjustment); only the monotonic clock is used then.
pub fn detect_gap(
    period: Duration,
    monotonic_elapsed: Duration,
    wall_elapsed: Option<Duration>,
    tolerance: Duration,
) -> Option<Duration> {
    let observed = wall_elapsed.map_or(monotonic_elapsed, |w| w.max(monotonic_elapsed));
    let gap = observed.saturating_sub(period);
    (gap > tolerance).then_some(gap)
}

/// Spawns the watcher.  `on_resume` runs with the detected gap each time the
/// machine appears to have slept.
pub fn spawn_resume_watcher<F>(period: Duration, tolerance: Duration, on_resume: F) -> JoinHandle<()>
where
    F: Fn(Duration) + Send + 'static,
{
    tokio::spawn(async move {
        let mut last_mono = Instant::now();
        let mut last_wall = SystemTime::now();
        loop {
            tokio::time::sleep(period).await;
            let (now_mono, now_wall) = (Instant::now(), SystemTime::now());
            let wall = now_wall.duration_since(last_wall).ok();
            if let Some(gap) = detect_gap(period, now_mono - last_mono, wall, tolerance) {
                info!(gap_secs = gap.as_secs(), "resume from suspend detected");
                on_resume(gap);
            }
            last_mono = now_mono;
            last_wall = now_wall;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERIOD: Duration = DEFAULT_PERIOD;
    const TOL: Duration = DEFAULT_TOLERANCE;

    #[test]
    fn test_on_time_tick_is_not_a_resume() {
        let gap = detect_gap(PERIOD, Duration::from_millis(5010), Some(Duration::from_millis(5012)), TOL);
        assert_eq!(gap, None);
    }

    #[test]
    fn test_wall_clock_jump_is_a_resume_when_monotonic_paused() {
        // Arrange: monotonic clock stopped during a 5 minute sleep
        let mono = Duration::from_secs(5);
        let wall = Some(Duration::from_secs(305));

        // Act
        let gap = detect_gap(PERIOD, mono, wall, TOL);

        // Assert
        assert_eq!(gap, Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_monotonic_jump_is_a_resume_when_wall_clock_went_backwards() {
        let gap = detect_gap(PERIOD, Duration::from_secs(65), None, TOL);
        assert_eq!(gap, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_delay_within_tolerance_is_ignored() {
        let gap = detect_gap(PERIOD, Duration::from_secs(14), Some(Duration::from_secs(14)), TOL);
        assert_eq!(gap, None);
    }
}
