//! Handler of batch fetching operations.
//!
//! This module defines two structs, [`Client`] and [`ClientBuilder`].
//! `Client` fetches batches of URLs and returns their bodies.
//! `ClientBuilder` exposes a finer level of granularity for building
//! a `Client`.
//!
//! For convenience, a free function [`fetch_all`] is provided which creates
//! a fresh connection pool for a single batch.
#![allow(clippy::module_name_repetitions)]
use std::sync::Arc;
use std::time::Duration;

use http::header::{self, HeaderMap, HeaderValue};
use typed_builder::TypedBuilder;

use crate::{
    ErrorKind, Result,
    backoff::{Backoff, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_WAIT_TIME_SECS},
    batch,
    dns::{CachingResolver, DEFAULT_DNS_CACHE_TTL},
    fetcher::Fetcher,
    transport::{HttpTransport, Transport},
};

/// Default number of targets fetched at the same time, 100.
pub const DEFAULT_CONCURRENCY: usize = 100;
/// Default timeout in seconds for establishing a connection, 3.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 3;
/// Default user agent, `batchfetch/<PKG_VERSION>`.
pub const DEFAULT_USER_AGENT: &str = concat!("batchfetch/", env!("CARGO_PKG_VERSION"));

// Constants currently not configurable by the user.
/// Idle connections kept per host, as a multiple of the concurrency.
const POOL_SIZE_FACTOR: usize = 2;
/// TCP keepalive
/// See <https://tldp.org/HOWTO/TCP-Keepalive-HOWTO/overview.html> for more info
const TCP_KEEPALIVE: u64 = 60;

/// Builder for [`Client`].
///
/// See crate-level documentation for usage example.
#[derive(TypedBuilder, Debug, Clone)]
#[builder(field_defaults(default, setter(into)))]
#[builder(builder_method(doc = "
Create a builder for building `ClientBuilder`.

On the builder call, call methods with same name as its fields to set their values.

Finally, call `.build()` to create the instance of `ClientBuilder`.
"))]
pub struct ClientBuilder {
    /// Maximum number of targets in flight at the same time.
    ///
    /// The connection pool keeps up to twice as many idle connections
    /// per host. Must be at least 1.
    #[builder(default = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Maximum number of attempts per target before it is given up.
    #[builder(default = DEFAULT_MAX_ATTEMPTS)]
    max_attempts: u32,

    /// Initial time between attempts of a failed target.
    ///
    /// The wait time doubles after every failed attempt.
    #[builder(default = Duration::from_secs(DEFAULT_RETRY_WAIT_TIME_SECS))]
    retry_wait_time: Duration,

    /// Timeout for the connect phase of a request.
    ///
    /// The timeout of a whole attempt depends on the URL, see
    /// [`crate::TimeoutTier`].
    #[builder(default = Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))]
    connect_timeout: Duration,

    /// How long resolved host names are reused.
    #[builder(default = DEFAULT_DNS_CACHE_TTL)]
    dns_cache_ttl: Duration,

    /// User-agent sent with every request.
    #[builder(default = String::from(DEFAULT_USER_AGENT))]
    user_agent: String,

    /// Sets the default [headers] for every request.
    ///
    /// Headers are passed through as they are. This is the place for
    /// e.g. an `Authorization` header obtained elsewhere.
    ///
    /// [headers]: https://docs.rs/http/latest/http/header/struct.HeaderName.html
    custom_headers: HeaderMap,

    /// When `true`, accept invalid SSL certificates.
    ///
    /// ## Warning
    ///
    /// You should think very carefully before using this method. If
    /// invalid certificates are trusted, any certificate for any site
    /// will be trusted for use. This includes expired certificates. This
    /// introduces significant vulnerabilities, and should only be used
    /// as a last resort.
    allow_insecure: bool,
}

impl Default for ClientBuilder {
    #[inline]
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ClientBuilder {
    /// Instantiates a [`Client`] with its own connection pool.
    ///
    /// # Errors
    ///
    /// Returns an `Err` if:
    /// - The concurrency is zero.
    /// - The user-agent is invalid.
    /// - The request client cannot be created.
    ///   See [here](https://docs.rs/reqwest/latest/reqwest/struct.ClientBuilder.html#errors).
    pub fn client(self) -> Result<Client> {
        validate_concurrency(self.concurrency)?;

        let Self {
            concurrency,
            max_attempts,
            retry_wait_time,
            connect_timeout,
            dns_cache_ttl,
            user_agent,
            custom_headers: mut headers,
            allow_insecure,
        } = self;

        headers.insert(header::USER_AGENT, HeaderValue::from_str(&user_agent)?);

        let reqwest_client = reqwest::ClientBuilder::new()
            .gzip(true)
            .default_headers(headers)
            .danger_accept_invalid_certs(allow_insecure)
            .connect_timeout(connect_timeout)
            .tcp_keepalive(Duration::from_secs(TCP_KEEPALIVE))
            .pool_max_idle_per_host(concurrency.saturating_mul(POOL_SIZE_FACTOR))
            .dns_resolver(Arc::new(CachingResolver::new(dns_cache_ttl)))
            .build()
            .map_err(ErrorKind::BuildClient)?;

        let transport = HttpTransport::new(reqwest_client, connect_timeout);
        Client::with_backoff(
            transport,
            concurrency,
            Backoff::new(max_attempts, retry_wait_time),
        )
    }
}

/// Fetches batches of URLs over a shared connection pool.
///
/// See [`ClientBuilder`] which contains sane defaults for all configuration options.
#[derive(Debug, Clone)]
pub struct Client<T = HttpTransport> {
    fetcher: Fetcher<T>,
    concurrency: usize,
}

impl<T: Transport> Client<T> {
    /// Create a client around any [`Transport`] with the default backoff.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidConcurrency`] if `concurrency` is zero.
    pub fn new(transport: T, concurrency: usize) -> Result<Self> {
        Self::with_backoff(transport, concurrency, Backoff::default())
    }

    /// Create a client around any [`Transport`] with a custom backoff.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidConcurrency`] if `concurrency` is zero.
    pub fn with_backoff(transport: T, concurrency: usize, backoff: Backoff) -> Result<Self> {
        validate_concurrency(concurrency)?;
        Ok(Self {
            fetcher: Fetcher::new(transport, backoff),
            concurrency,
        })
    }

    /// Maximum number of targets in flight at the same time
    #[must_use]
    pub const fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Fetch a single URL with retries, outside of any batch.
    ///
    /// Returns `None` if every attempt failed.
    pub async fn fetch(&self, url: &str) -> Option<String> {
        self.fetcher.fetch(url, 1).await
    }

    /// Fetch all `targets`, keeping at most [`Client::concurrency`] of them in
    /// flight.
    ///
    /// The result has one entry per target, in input order: the body, or
    /// `None` if the target could not be fetched. Failures of single targets
    /// never fail the batch.
    pub async fn fetch_all<S>(&self, targets: &[S]) -> Vec<Option<String>>
    where
        S: AsRef<str> + Sync,
    {
        batch::run(&self.fetcher, targets, self.concurrency).await
    }
}

/// Fetch all `targets` with at most `concurrency` requests in flight.
///
/// A connection pool and an admission gate are created for this call and
/// torn down before it returns. To reuse connections across batches, build a
/// [`Client`] with the [`ClientBuilder`] instead.
///
/// # Errors
///
/// Returns an `Err` before any request is sent if `concurrency` is zero or
/// the HTTP client cannot be created (see [`ClientBuilder::client`]).
pub async fn fetch_all<S>(targets: &[S], concurrency: usize) -> Result<Vec<Option<String>>>
where
    S: AsRef<str> + Sync,
{
    let client = ClientBuilder::builder()
        .concurrency(concurrency)
        .build()
        .client()?;
    Ok(client.fetch_all(targets).await)
}

fn validate_concurrency(concurrency: usize) -> Result<()> {
    if concurrency == 0 {
        return Err(ErrorKind::InvalidConcurrency(concurrency));
    }
    Ok(())
}
