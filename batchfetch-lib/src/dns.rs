//! A DNS resolver which remembers lookups for a fixed time.
//!
//! Batches often hit the same few hosts many times. Resolving each host once
//! per TTL instead of once per connection keeps lookups off the hot path when
//! many requests start at the same time.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use log::trace;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};

use crate::BoxError;

/// Default time a resolved host is kept, 300 seconds.
pub const DEFAULT_DNS_CACHE_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
struct CachedLookup {
    resolved_at: Instant,
    addrs: Vec<SocketAddr>,
}

/// Resolves host names with the system resolver and caches the result
#[derive(Debug, Clone)]
pub struct CachingResolver {
    ttl: Duration,
    cache: Arc<DashMap<String, CachedLookup>>,
}

impl Default for CachingResolver {
    fn default() -> Self {
        Self::new(DEFAULT_DNS_CACHE_TTL)
    }
}

impl CachingResolver {
    /// Create a resolver keeping lookups for `ttl`
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            cache: Arc::new(DashMap::new()),
        }
    }

    /// Time a lookup stays valid
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of hosts currently cached, expired entries included
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Returns `true` if nothing has been resolved yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Resolve `host`, answering from the cache while the entry is fresh.
    ///
    /// # Errors
    ///
    /// Returns the resolver's `io::Error` if the lookup fails. Failed
    /// lookups are not cached.
    pub async fn lookup(&self, host: &str) -> std::io::Result<Vec<SocketAddr>> {
        if let Some(entry) = self.cache.get(host) {
            if entry.resolved_at.elapsed() < self.ttl {
                trace!("DNS cache hit for {host}");
                return Ok(entry.addrs.clone());
            }
        }

        // The port is replaced by the connector with the one from the URL
        let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, 0)).await?.collect();
        trace!("Resolved {host} to {} address(es)", addrs.len());
        self.cache.insert(
            host.to_string(),
            CachedLookup {
                resolved_at: Instant::now(),
                addrs: addrs.clone(),
            },
        );
        Ok(addrs)
    }
}

impl Resolve for CachingResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let resolver = self.clone();
        Box::pin(async move {
            let addrs = resolver.lookup(name.as_str()).await?;
            let addrs: Addrs = Box::new(addrs.into_iter());
            Ok::<_, BoxError>(addrs)
        })
    }
}
