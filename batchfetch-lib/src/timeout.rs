//! Timeout selection by URL shape.
//!
//! Endpoints that are presumed to be slow get a longer timeout. The decision
//! is a plain, case-sensitive substring match on the URL. Order matters: a URL
//! containing both `/delay/` and `/status/` belongs to the delay tier.

use std::time::Duration;

use strum::Display;

/// Timeout for URLs containing `/delay/`, 10 seconds.
pub const DELAY_TIMEOUT: Duration = Duration::from_secs(10);
/// Timeout for URLs containing `/status/` (but not `/delay/`), 8 seconds.
pub const STATUS_TIMEOUT: Duration = Duration::from_secs(8);
/// Timeout for all other URLs, 6 seconds.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(6);

const DELAY_MARKER: &str = "/delay/";
const STATUS_MARKER: &str = "/status/";

/// The timeout class a URL falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum TimeoutTier {
    /// Deliberately delayed endpoints
    Delay,
    /// Endpoints answering with a chosen status code
    Status,
    /// Everything else
    Default,
}

impl TimeoutTier {
    /// Classify a URL. The first matching tier wins.
    #[must_use]
    pub fn classify(url: &str) -> Self {
        if url.contains(DELAY_MARKER) {
            Self::Delay
        } else if url.contains(STATUS_MARKER) {
            Self::Status
        } else {
            Self::Default
        }
    }

    /// Timeout for a single attempt in this tier
    #[must_use]
    pub const fn duration(self) -> Duration {
        match self {
            Self::Delay => DELAY_TIMEOUT,
            Self::Status => STATUS_TIMEOUT,
            Self::Default => DEFAULT_TIMEOUT,
        }
    }
}

/// Timeout for a single attempt at fetching `url`
#[must_use]
pub fn timeout_for(url: &str) -> Duration {
    TimeoutTier::classify(url).duration()
}
