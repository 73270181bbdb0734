//! Poll interval schedule for external jobs.

use std::time::Duration;

/// Interval between provider polls, growing with the age of the job.
///
/// Jobs younger than `fast_phase` are polled every `fast_interval`, older
/// jobs every `slow_interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    /// Interval used while the job is young.
    pub fast_interval: Duration,
    /// Interval used once the job is older than `fast_phase`.
    pub slow_interval: Duration,
    /// How long the fast interval applies.
    pub fast_phase: Duration,
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self {
            fast_interval: Duration::from_secs(15),
            slow_interval: Duration::from_secs(60),
            fast_phase: Duration::from_secs(5 * 60),
        }
    }
}

impl PollSchedule {
    /// Creates a schedule.
    #[must_use]
    pub fn new(fast_interval: Duration, slow_interval: Duration, fast_phase: Duration) -> Self {
        Self {
            fast_interval,
            slow_interval: slow_interval.max(fast_interval),
            fast_phase,
        }
    }

    /// Returns the wait before the next poll of a job of age `elapsed`.
    #[must_use]
    pub fn interval_for(&self, elapsed: Duration) -> Duration {
        if elapsed < self.fast_phase {
            self.fast_interval
        } else {
            self.slow_interval
        }
    }
}
