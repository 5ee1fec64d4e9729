use std::fmt::Display;
use std::time::Duration;

use serde::{Serialize, Serializer};

/// Aggregate outcome of one batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// Number of targets in the batch
    pub total: usize,
    /// Number of targets for which a body was fetched
    pub succeeded: usize,
    /// Wall-clock time of the whole batch
    #[serde(rename = "elapsed_secs", serialize_with = "serialize_secs")]
    pub elapsed: Duration,
    /// Concurrency limit the batch ran with
    pub concurrency: usize,
}

impl BatchSummary {
    /// Summarize the results of a batch
    #[must_use]
    pub fn new(results: &[Option<String>], elapsed: Duration, concurrency: usize) -> Self {
        Self {
            total: results.len(),
            succeeded: results.iter().filter(|r| r.is_some()).count(),
            elapsed,
            concurrency,
        }
    }

    /// Number of targets that yielded no body
    #[must_use]
    pub const fn failed(&self) -> usize {
        self.total - self.succeeded
    }

    /// Returns `true` if every target was fetched
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.succeeded == self.total
    }

    /// Successful requests per second over the whole batch
    ///
    /// Returns `0.0` if no time has elapsed.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn requests_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.succeeded as f64 / secs
        } else {
            0.0
        }
    }

    /// Average wall-clock time per target
    #[must_use]
    pub fn average_per_target(&self) -> Duration {
        match u32::try_from(self.total) {
            Ok(total) if total > 0 => self.elapsed / total,
            _ => Duration::ZERO,
        }
    }
}

impl Display for BatchSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} URLs in {:.2}s (RPS: {:.2}, concurrency: {})",
            self.succeeded,
            self.total,
            self.elapsed.as_secs_f64(),
            self.requests_per_second(),
            self.concurrency
        )
    }
}

fn serialize_secs<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_f64(duration.as_secs_f64())
}
