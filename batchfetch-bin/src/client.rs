use crate::options::{Config, HeaderMapExt};
use anyhow::{Context, Result};
use batchfetch_lib::{Client, ClientBuilder};
use http::HeaderMap;
use std::time::Duration;

/// Creates a client according to the command-line config
///
/// Fails on configuration errors (zero concurrency, malformed headers)
/// before any network activity takes place.
pub(crate) fn create(cfg: &Config) -> Result<Client> {
    let headers = HeaderMap::from_header_pairs(&cfg.header)?;

    ClientBuilder::builder()
        .concurrency(cfg.concurrency)
        .max_attempts(cfg.max_attempts)
        .retry_wait_time(Duration::from_secs(cfg.retry_wait_time))
        .connect_timeout(Duration::from_secs(cfg.connect_timeout))
        .user_agent(cfg.user_agent.clone())
        .custom_headers(headers)
        .allow_insecure(cfg.insecure)
        .build()
        .client()
        .context("Failed to create request client")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let cfg = Config {
            concurrency: 0,
            ..Config::default()
        };

        let error = create(&cfg).unwrap_err();
        assert!(format!("{error:#}").contains("concurrency"));
    }

    #[test]
    fn test_create_with_headers() {
        let cfg = Config {
            concurrency: 4,
            header: vec![("X-Token".to_string(), "secret".to_string())],
            ..Config::default()
        };

        let client = create(&cfg).unwrap();
        assert_eq!(client.concurrency(), 4);
    }

    #[test]
    fn test_invalid_user_agent() {
        let cfg = Config {
            concurrency: 4,
            user_agent: "bad\nagent".to_string(),
            ..Config::default()
        };

        assert!(create(&cfg).is_err());
    }
}
