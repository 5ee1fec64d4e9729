use std::fmt;

/// Wrapper around [`std::time::Duration`] for human-readable output.
///
/// Durations below one minute keep two decimals, since most batches finish
/// in seconds. Longer durations are split into whole units.
///
/// # Examples
///
/// ```text
/// 0.25s
/// 59.99s
/// 1m 1s
/// 1h 1m 1s
/// ```
pub(crate) struct Duration {
    elapsed: std::time::Duration,
}

impl Duration {
    /// Create a new `Duration` from the given number of seconds.
    #[cfg(test)]
    pub(crate) const fn from_secs(secs: u64) -> Self {
        Self {
            elapsed: std::time::Duration::from_secs(secs),
        }
    }
}

impl From<std::time::Duration> for Duration {
    fn from(elapsed: std::time::Duration) -> Self {
        Self { elapsed }
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.elapsed.as_secs();
        if secs < 60 {
            return write!(f, "{:.2}s", self.elapsed.as_secs_f64());
        }

        let days = secs / 86400;
        let hours = (secs % 86400) / 3600;
        let minutes = (secs % 3600) / 60;
        let seconds = secs % 60;

        if days > 0 {
            write!(f, "{days}d {hours}h {minutes}m {seconds}s")
        } else if hours > 0 {
            write!(f, "{hours}h {minutes}m {seconds}s")
        } else {
            write!(f, "{minutes}m {seconds}s")
        }
    }
}
