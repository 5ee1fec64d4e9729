use http::StatusCode;

/// The outcome of a successful attempt: the status line and the fully read
/// body of the response.
///
/// The status is kept for logging only. Any response whose body could be
/// read counts as a success, including non-2xx responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    /// HTTP status code of the response
    pub status: StatusCode,
    /// Response body, decoded as text
    pub body: String,
}

impl Fetched {
    /// Create a new `Fetched` from a status code and a body
    #[must_use]
    pub fn new<S: Into<String>>(status: StatusCode, body: S) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Body of the response, dropping the status
    #[must_use]
    pub fn into_body(self) -> String {
        self.body
    }
}
