//! `batchfetch` is a library for fetching many URLs concurrently.
//!
//! Each URL is fetched with a HTTP GET. At most a fixed number of requests
//! are in flight at any time, failed requests are retried with exponential
//! backoff and connections are reused across requests.
//!
//! "Hello world" example:
//! ```no_run
//! use batchfetch_lib::Result;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!   let urls = ["https://httpbin.org/get", "https://httpbin.org/delay/1"];
//!   let bodies = batchfetch_lib::fetch_all(&urls, 10).await?;
//!   for (url, body) in urls.iter().zip(bodies) {
//!     println!("{url}: {}", body.map_or(0, |b| b.len()));
//!   }
//!   Ok(())
//! }
//! ```
//!
//! For more specific use-cases you can build a client yourself,
//! using the `ClientBuilder`. A client keeps its connection pool alive
//! across batches:
//!
//! ```no_run
//! use batchfetch_lib::{ClientBuilder, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!   let client = ClientBuilder::builder().concurrency(5_usize).build().client()?;
//!   let bodies = client.fetch_all(&["https://httpbin.org/status/200"]).await;
//!   assert_eq!(bodies.len(), 1);
//!   Ok(())
//! }
//! ```
#![warn(clippy::all, clippy::pedantic)]
#![warn(
    absolute_paths_not_starting_with_crate,
    rustdoc::invalid_html_tags,
    missing_copy_implementations,
    missing_debug_implementations,
    semicolon_in_expressions_from_macros,
    unreachable_pub,
    unused_extern_crates,
    variant_size_differences,
    clippy::missing_const_for_fn
)]
#![deny(anonymous_parameters, macro_use_extern_crate)]
#![deny(missing_docs)]

#[cfg(feature = "native-tls")]
use openssl_sys as _; // required for vendored-openssl feature
use ring as _; // required for apple silicon

mod backoff;
mod batch;
mod client;
mod dns;
mod fetcher;
mod gate;
mod timeout;
mod timer;
mod transport;
mod types;

pub use backoff::{Backoff, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_WAIT_TIME_SECS};
pub use client::{
    Client, ClientBuilder, DEFAULT_CONCURRENCY, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_USER_AGENT,
    fetch_all,
};
pub use dns::{CachingResolver, DEFAULT_DNS_CACHE_TTL};
pub use gate::{Admission, AdmissionGate};
pub use timeout::{DEFAULT_TIMEOUT, DELAY_TIMEOUT, STATUS_TIMEOUT, TimeoutTier, timeout_for};
pub use timer::{LogTime, timed, timed_with_level};
pub use transport::{HttpTransport, Transport};
pub use types::*;
