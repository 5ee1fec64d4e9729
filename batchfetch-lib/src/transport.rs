//! The seam between fetch logic and the network.
//!
//! The fetcher only needs "GET this URL and give me the body". Keeping that
//! behind the [`Transport`] trait lets the batch logic run against a real
//! connection pool ([`HttpTransport`]) as well as against in-memory doubles.

use std::io;
use std::time::Duration;

use async_trait::async_trait;

use crate::{AttemptError, Fetched};

/// Performs a single HTTP GET and reads the whole response body
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch `url` once.
    ///
    /// # Errors
    ///
    /// Returns an [`AttemptError`] describing why the request or reading
    /// its body failed. Timeouts are enforced by the caller, which drops
    /// the returned future once the attempt runs out of time.
    async fn get(&self, url: &str) -> Result<Fetched, AttemptError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn get(&self, url: &str) -> Result<Fetched, AttemptError> {
        (**self).get(url).await
    }
}

/// [`Transport`] backed by a shared [`reqwest::Client`].
///
/// `reqwest` keeps a pool of keep-alive connections per host inside the
/// client, so all attempts sharing one `HttpTransport` reuse connections.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    connect_timeout: Duration,
}

impl HttpTransport {
    /// Wrap an already configured client.
    ///
    /// `connect_timeout` is the connect timeout the client was built with.
    /// It is only used to report connect timeouts.
    #[must_use]
    pub const fn new(client: reqwest::Client, connect_timeout: Duration) -> Self {
        Self {
            client,
            connect_timeout,
        }
    }

    /// The underlying `reqwest` client
    #[must_use]
    pub const fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<Fetched, AttemptError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify(e, self.connect_timeout))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| classify(e, self.connect_timeout))?;
        Ok(Fetched::new(status, body))
    }
}

/// Map a `reqwest` error onto the cause of a failed attempt.
///
/// Modified from the retry classification in [reqwest-middleware].
///
/// [reqwest-middleware]: https://github.com/TrueLayer/reqwest-middleware/blob/f854725791ccf4a02c401a26cab3d9db753f468c/reqwest-retry/src/retryable.rs
pub(crate) fn classify(error: reqwest::Error, connect_timeout: Duration) -> AttemptError {
    if error.is_timeout() {
        AttemptError::Timeout(connect_timeout)
    } else if error.is_connect() {
        AttemptError::Connect(error.into())
    } else if error.is_body() || error.is_decode() {
        AttemptError::ReadBody(error.into())
    } else if is_io_timeout(&error) {
        AttemptError::Timeout(connect_timeout)
    } else {
        AttemptError::Network(error.into())
    }
}

/// Checks whether the error was caused by an `io::Error` timing out
/// somewhere below `hyper`.
fn is_io_timeout(error: &reqwest::Error) -> bool {
    // It seems that hyper errors are not always classified by reqwest.
    // Walk the source chain to find out what actually happened.
    let Some(hyper_error) = get_source_error_type::<hyper::Error>(error) else {
        return false;
    };
    if hyper_error.is_timeout() {
        return true;
    }
    get_source_error_type::<io::Error>(hyper_error)
        .is_some_and(|io_error| io_error.kind() == io::ErrorKind::TimedOut)
}

/// Downcasts the given err source into T.
fn get_source_error_type<T: std::error::Error + 'static>(
    err: &dyn std::error::Error,
) -> Option<&T> {
    let mut source = err.source();

    while let Some(err) = source {
        if let Some(source_err) = err.downcast_ref::<T>() {
            return Some(source_err);
        }

        source = err.source();
    }
    None
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use http::StatusCode;
    use test_utils::{mock_server, unreachable_url};
    use wiremock::{Mock, MockServer, ResponseTemplate, matchers::method};

    use super::{HttpTransport, Transport};
    use crate::AttemptError;

    fn transport() -> HttpTransport {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(3))
            .build()
            .unwrap();
        HttpTransport::new(client, Duration::from_secs(3))
    }

    #[tokio::test]
    async fn test_reads_body() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .mount(&mock_server)
            .await;

        let fetched = transport().get(&mock_server.uri()).await.unwrap();
        assert_eq!(fetched.status, StatusCode::OK);
        assert_eq!(fetched.body, "hello");
    }

    #[tokio::test]
    async fn test_error_status_is_not_a_transport_error() {
        let mock_server = mock_server!(StatusCode::INTERNAL_SERVER_ERROR);
        let fetched = transport().get(&mock_server.uri()).await.unwrap();
        assert_eq!(fetched.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(fetched.body.is_empty());
    }

    #[tokio::test]
    async fn test_connection_refused_is_connect_error() {
        let err = transport().get(&unreachable_url!()).await.unwrap_err();
        assert!(matches!(err, AttemptError::Connect(_)), "{err:?}");
    }

    #[tokio::test]
    async fn test_invalid_url_fails() {
        let err = transport().get("not a url").await.unwrap_err();
        assert!(!err.is_timeout());
    }
}
