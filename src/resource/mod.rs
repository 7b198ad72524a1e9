//! Remote resources: fetching, base64 encoding and the per-conversion cache.
//!
//! Every URL a conversion embeds goes through [`ResourceCache::get_and_encode`].
//! The cache entry is inserted before the fetch is first polled, so any
//! number of concurrent lookups for one URL share a single request.

use crate::{Error, Result};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub mod data_url;
#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::HttpFetcher;

/// Default `http_timeout_ms`.
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 30_000;

/// A single resource request.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub url: String,
    pub timeout: Duration,
    /// Send cookies/credentials with cross-origin requests
    pub with_credentials: bool,
}

/// Backend that retrieves raw resource bytes.
///
/// Implementations report a non-success status as [`Error::HttpStatus`] and
/// an expired deadline as [`Error::Timeout`].
pub trait ResourceFetcher: Send + Sync {
    fn fetch(&self, request: FetchRequest) -> BoxFuture<'static, Result<Vec<u8>>>;
}

/// Fetcher for builds without network access: every request fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineFetcher;

impl ResourceFetcher for OfflineFetcher {
    fn fetch(&self, request: FetchRequest) -> BoxFuture<'static, Result<Vec<u8>>> {
        let err = Error::NetworkError(format!("network access disabled: {}", request.url));
        async move { Err(err) }.boxed()
    }
}

/// How a conversion fetches: placeholder fallback, cache-busting, timeout.
#[derive(Debug, Clone, Default)]
pub struct FetchPolicy {
    /// Base64 payload substituted for resources that cannot be fetched
    pub placeholder: Option<String>,
    /// Token appended as a query parameter; one per conversion
    pub cache_bust: Option<String>,
    pub timeout: Duration,
    pub with_credentials: bool,
}

impl FetchPolicy {
    /// URL actually requested (and used as cache key).
    pub fn request_url(&self, url: &str) -> String {
        match &self.cache_bust {
            Some(token) => {
                let sep = if url.contains('?') { '&' } else { '?' };
                format!("{}{}{}", url, sep, token)
            }
            None => url.to_string(),
        }
    }
}

/// A pending or settled fetch-and-encode, resolving to a base64 payload.
pub type PendingResource = Shared<BoxFuture<'static, Result<String>>>;

/// Per-conversion resource cache keyed by the requested URL.
pub struct ResourceCache {
    fetcher: Arc<dyn ResourceFetcher>,
    policy: FetchPolicy,
    entries: Mutex<HashMap<String, PendingResource>>,
}

impl std::fmt::Debug for ResourceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceCache")
            .field("policy", &self.policy)
            .field("entries", &self.len())
            .finish()
    }
}

impl ResourceCache {
    pub fn new(fetcher: Arc<dyn ResourceFetcher>, policy: FetchPolicy) -> Self {
        Self {
            fetcher,
            policy,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> &FetchPolicy {
        &self.policy
    }

    /// Fetch `url` and resolve to its base64 payload, sharing the request
    /// with every other caller asking for the same URL in this conversion.
    pub fn get_and_encode(&self, url: &str) -> PendingResource {
        let request_url = self.policy.request_url(url);
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(pending) = entries.get(&request_url) {
            log::trace!("resource cache hit: {}", request_url);
            return pending.clone();
        }

        let request = FetchRequest {
            url: request_url.clone(),
            timeout: self.policy.timeout,
            with_credentials: self.policy.with_credentials,
        };
        let pending = fetch_and_encode(
            Arc::clone(&self.fetcher),
            request,
            self.policy.placeholder.clone(),
        )
        .boxed()
        .shared();
        entries.insert(request_url, pending.clone());
        pending
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

async fn fetch_and_encode(
    fetcher: Arc<dyn ResourceFetcher>,
    request: FetchRequest,
    placeholder: Option<String>,
) -> Result<String> {
    let url = request.url.clone();
    let timeout = request.timeout;
    let outcome = match tokio::time::timeout(timeout, fetcher.fetch(request)).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout {
            url: url.clone(),
            timeout_ms: timeout.as_millis() as u64,
        }),
    };

    match outcome {
        Ok(bytes) => Ok(data_url::encode_base64(&bytes)),
        Err(err) => match placeholder {
            Some(placeholder) => {
                log::debug!("using placeholder for {}: {}", url, err);
                Ok(placeholder)
            }
            None => {
                log::error!("{}", err);
                Err(err)
            }
        },
    }
}
