use std::time::{Duration, Instant};

use log::{debug, info, warn};
use tokio::time::{sleep, timeout};

use crate::{AttemptError, Fetched, backoff::Backoff, timeout::TimeoutTier, transport::Transport};

/// Fetches one target, retrying failed attempts with exponential backoff.
///
/// Every attempt gets a timeout derived from the URL (see [`TimeoutTier`]).
/// Any failure, be it a timeout, a refused connection or a broken body,
/// is treated the same way: wait, then try again until the attempt budget
/// is spent. The status code is never inspected, so a 500 with a readable
/// body is a success.
#[derive(Debug, Clone)]
pub(crate) struct Fetcher<T> {
    transport: T,
    backoff: Backoff,
}

impl<T: Transport> Fetcher<T> {
    pub(crate) const fn new(transport: T, backoff: Backoff) -> Self {
        Self { transport, backoff }
    }

    pub(crate) const fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    /// Fetch `url` and return its body, or `None` once all attempts failed.
    ///
    /// `active` is the number of in-flight targets at admission time and is
    /// only used for logging.
    pub(crate) async fn fetch(&self, url: &str, active: usize) -> Option<String> {
        let tier = TimeoutTier::classify(url);
        let limit = tier.duration();
        debug!("Starting request to {url} (timeout: {tier}, concurrent requests: {active})");

        for attempt in self.backoff.attempts() {
            let start = Instant::now();
            match self.attempt(url, limit).await {
                Ok(fetched) => {
                    log_success(url, &fetched, start.elapsed(), attempt, active);
                    return Some(fetched.into_body());
                }
                Err(e) => match self.backoff.delay(attempt) {
                    Some(wait) => {
                        debug!(
                            "Attempt {} for {url} failed ({}): {e}. Retrying in {}s",
                            attempt + 1,
                            e.cause(),
                            wait.as_secs_f64()
                        );
                        sleep(wait).await;
                    }
                    None => {
                        warn!(
                            "Error fetching {url} after {} attempt(s): {e} (concurrent requests: {active})",
                            attempt + 1
                        );
                    }
                },
            }
        }
        None
    }

    /// Run a single attempt, giving up once `limit` has passed.
    ///
    /// Dropping the transport future on timeout aborts the I/O of this
    /// attempt only.
    async fn attempt(&self, url: &str, limit: Duration) -> Result<Fetched, AttemptError> {
        match timeout(limit, self.transport.get(url)).await {
            Ok(result) => result,
            Err(_elapsed) => Err(AttemptError::Timeout(limit)),
        }
    }
}

fn log_success(url: &str, fetched: &Fetched, elapsed: Duration, attempt: u32, active: usize) {
    if !fetched.status.is_success() {
        // Any readable body counts as a result, whatever the status
        warn!(
            "Fetched {url} with non-success status {}; returning its body",
            fetched.status
        );
    }
    info!(
        "Successfully fetched {url} in {:.4}s on attempt {} (concurrent requests: {active})",
        elapsed.as_secs_f64(),
        attempt + 1
    );
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use http::StatusCode;
    use pretty_assertions::assert_eq;
    use tokio::time::Instant;

    use super::Fetcher;
    use crate::{AttemptError, Fetched, backoff::Backoff, transport::Transport};

    /// Fails a fixed number of times, then answers with the URL as body.
    /// Records the (paused) clock at the start of every attempt.
    #[derive(Debug, Default)]
    struct Flaky {
        failures: u32,
        hang: bool,
        calls: AtomicU32,
        starts: Mutex<Vec<Instant>>,
    }

    impl Flaky {
        fn failing(failures: u32) -> Self {
            Self {
                failures,
                ..Self::default()
            }
        }

        fn hanging() -> Self {
            Self {
                failures: u32::MAX,
                hang: true,
                ..Self::default()
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }

        fn gaps(&self) -> Vec<Duration> {
            let starts = self.starts.lock().unwrap();
            starts.windows(2).map(|w| w[1] - w[0]).collect()
        }
    }

    #[async_trait]
    impl Transport for Flaky {
        async fn get(&self, url: &str) -> Result<Fetched, AttemptError> {
            self.starts.lock().unwrap().push(Instant::now());
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                if self.hang {
                    std::future::pending::<()>().await;
                }
                return Err(AttemptError::Connect(
                    io::Error::from(io::ErrorKind::ConnectionRefused).into(),
                ));
            }
            Ok(Fetched::new(StatusCode::OK, url))
        }
    }

    fn fetcher(transport: &Flaky) -> Fetcher<&Flaky> {
        Fetcher::new(transport, Backoff::default())
    }

    #[async_trait]
    impl Transport for &Flaky {
        async fn get(&self, url: &str) -> Result<Fetched, AttemptError> {
            (**self).get(url).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_attempt_never_sleeps() {
        let transport = Flaky::failing(0);
        let start = Instant::now();

        let body = fetcher(&transport).fetch("http://ok", 1).await;

        assert_eq!(body.as_deref(), Some("http://ok"));
        assert_eq!(transport.calls(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let transport = Flaky::failing(2);

        let body = fetcher(&transport).fetch("http://flaky", 1).await;

        assert_eq!(body.as_deref(), Some("http://flaky"));
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_three_attempts() {
        let transport = Flaky::failing(u32::MAX);

        let body = fetcher(&transport).fetch("http://down", 1).await;

        assert_eq!(body, None);
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_between_attempts() {
        let transport = Flaky::failing(u32::MAX);

        fetcher(&transport).fetch("http://down", 1).await;

        let gaps = transport.gaps();
        assert_eq!(gaps.len(), 2);
        for (gap, expected) in gaps.iter().zip([1.0, 2.0]) {
            let secs = gap.as_secs_f64();
            assert!(
                (secs - expected).abs() <= expected * 0.2,
                "expected ~{expected}s between attempts, got {secs}s"
            );
        }
    }

    #[rstest::rstest]
    #[case("http://host/delay/1", 10)]
    #[case("http://host/status/503", 8)]
    #[case("http://host/get", 6)]
    #[tokio::test(start_paused = true)]
    async fn test_timeout_tiers(#[case] url: &str, #[case] timeout_secs: u64) {
        let transport = Flaky::hanging();
        let start = Instant::now();

        let body = fetcher(&transport).fetch(url, 1).await;

        assert_eq!(body, None);
        assert_eq!(transport.calls(), 3);
        // Three timed out attempts plus the 1s and 2s backoff in between
        assert_eq!(start.elapsed(), Duration::from_secs(3 * timeout_secs + 3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_success_status_is_returned() {
        struct ServerError;

        #[async_trait]
        impl Transport for ServerError {
            async fn get(&self, _url: &str) -> Result<Fetched, AttemptError> {
                Ok(Fetched::new(StatusCode::INTERNAL_SERVER_ERROR, "oops"))
            }
        }

        let body = Fetcher::new(ServerError, Backoff::default())
            .fetch("http://host/status/500", 1)
            .await;
        assert_eq!(body.as_deref(), Some("oops"));
    }
}
