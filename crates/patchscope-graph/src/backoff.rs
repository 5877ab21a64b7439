//! Parameterized exponential backoff shared by retries and job polling.

use std::time::Duration;

/// Exponential backoff parameters: initial delay, growth factor, cap.
///
/// One implementation serves both the gateway's retry delays and the
/// export-job poll schedule; only the parameters differ.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    pub initial: Duration,
    pub factor: f64,
    pub cap: Duration,
}

impl Backoff {
    #[must_use]
    pub const fn new(initial: Duration, factor: f64, cap: Duration) -> Self {
        Self {
            initial,
            factor,
            cap,
        }
    }

    /// Gateway retry schedule: 1 s base, doubling, capped at 32 s.
    #[must_use]
    pub const fn transport() -> Self {
        Self::new(Duration::from_secs(1), 2.0, Duration::from_secs(32))
    }

    /// Export-job poll schedule: 500 ms, x1.5 per poll, capped at 4 s.
    #[must_use]
    pub const fn polling() -> Self {
        Self::new(Duration::from_millis(500), 1.5, Duration::from_millis(4000))
    }

    /// Delay before the given zero-indexed attempt.
    ///
    /// Grows geometrically in f64 and is rounded to whole milliseconds at
    /// the boundary, so the polling sequence runs 500, 750, 1125, 1688,
    /// 2531, 3797 and then holds at the cap.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let raw = self.initial.as_millis() as f64 * self.factor.powi(attempt as i32);
        let capped = raw.min(self.cap.as_millis() as f64);
        Duration::from_millis(capped.round() as u64)
    }

    /// Infinite iterator over the delay sequence.
    #[must_use]
    pub fn schedule(&self) -> BackoffSchedule {
        BackoffSchedule {
            backoff: *self,
            attempt: 0,
        }
    }
}

/// Iterator form of a [`Backoff`] delay sequence. Never terminates; the
/// consumer bounds it by attempt count or elapsed time.
#[derive(Debug, Clone)]
pub struct BackoffSchedule {
    backoff: Backoff,
    attempt: u32,
}

impl Iterator for BackoffSchedule {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let delay = self.backoff.delay_for(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        Some(delay)
    }
}
