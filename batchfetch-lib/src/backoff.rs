use std::ops::Range;
use std::time::Duration;

/// Default number of attempts per target before giving up, 3.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Default wait time in seconds before the first retry, 1.
pub const DEFAULT_RETRY_WAIT_TIME_SECS: u64 = 1;

/// Exponential backoff between attempts.
///
/// After a failed attempt with index `n` (0-based) the fetcher waits
/// `base * 2^n` before trying again, unless that attempt was the last one.
/// With the defaults this yields waits of 1s and 2s between three attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    max_attempts: u32,
    base: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_ATTEMPTS,
            Duration::from_secs(DEFAULT_RETRY_WAIT_TIME_SECS),
        )
    }
}

impl Backoff {
    /// Create a new backoff policy.
    ///
    /// `max_attempts` is clamped to at least one attempt.
    #[must_use]
    pub fn new(max_attempts: u32, base: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base,
        }
    }

    /// Total number of attempts per target
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Indices of all attempts, starting at 0
    #[must_use]
    pub const fn attempts(&self) -> Range<u32> {
        0..self.max_attempts
    }

    /// Wait time after the failed attempt with the given index.
    ///
    /// Returns `None` if no attempts remain.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        if attempt.saturating_add(1) >= self.max_attempts {
            return None;
        }
        let factor = 1_u32.checked_shl(attempt).unwrap_or(u32::MAX);
        Some(self.base.saturating_mul(factor))
    }
}
