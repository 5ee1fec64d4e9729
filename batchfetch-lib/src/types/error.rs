use std::time::Duration;
use thiserror::Error;

/// Boxed error used as the source of an [`AttemptError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Possible errors when setting up a batch with `batchfetch_lib`.
///
/// Failures of individual requests never show up here. They are retried
/// and, once exhausted, reported as a missing body in the batch result.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The concurrency limit must admit at least one request at a time
    #[error("Invalid concurrency `{0}`: at least one request must be allowed in flight")]
    InvalidConcurrency(usize),

    /// The HTTP client backing the connection pool could not be created
    #[error("Failed to create the HTTP client: {0}")]
    BuildClient(#[source] reqwest::Error),

    /// The given header could not be parsed.
    /// A possible error when converting a `HeaderValue` from a string or byte
    /// slice.
    #[error("Header could not be parsed.")]
    InvalidHeader(#[from] http::header::InvalidHeaderValue),
}

impl PartialEq for ErrorKind {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InvalidConcurrency(c1), Self::InvalidConcurrency(c2)) => c1 == c2,
            (Self::BuildClient(e1), Self::BuildClient(e2)) => e1.to_string() == e2.to_string(),
            (Self::InvalidHeader(_), Self::InvalidHeader(_)) => true,
            _ => false,
        }
    }
}

impl Eq for ErrorKind {}

/// Why a single attempt at fetching a target failed.
///
/// This is only used for logging. Callers of the batch API see a missing
/// body, whatever the cause was.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AttemptError {
    /// The attempt did not complete within its timeout
    #[error("Timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    /// DNS resolution or establishing the connection failed
    #[error("Failed to connect: {0}")]
    Connect(#[source] BoxError),

    /// The response arrived but its body could not be read
    #[error("Failed to read response body: {0}")]
    ReadBody(#[source] BoxError),

    /// Any other transport-level failure
    #[error("Network error: {0}")]
    Network(#[source] BoxError),
}

impl AttemptError {
    /// Short, stable name of the failure cause, suitable for log fields
    #[must_use]
    pub const fn cause(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timeout",
            Self::Connect(_) => "connect",
            Self::ReadBody(_) => "body",
            Self::Network(_) => "network",
        }
    }

    /// Returns `true` if the attempt ran out of time
    #[inline]
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}
