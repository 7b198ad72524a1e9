//! `reqwest`-backed resource fetcher.

use super::{FetchRequest, ResourceFetcher};
use crate::{Error, Result};
use futures::future::{BoxFuture, FutureExt};
use reqwest::Client;

/// Default user agent sent with resource requests.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) Gecko/20100101 Firefox/115.0 RFOX/0.3";

/// Fetches resources over HTTP(S).
///
/// Credentialed requests go through a second client with a cookie store so
/// cookies set by earlier responses are replayed, the closest equivalent of
/// a browser's `withCredentials`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    credentialed: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        Self::with_user_agent(DEFAULT_USER_AGENT)
    }

    pub fn with_user_agent(user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| Error::ConfigError(format!("Failed to build HTTP client: {}", e)))?;
        let credentialed = Client::builder()
            .user_agent(user_agent)
            .cookie_store(true)
            .build()
            .map_err(|e| Error::ConfigError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            credentialed,
        })
    }
}

impl ResourceFetcher for HttpFetcher {
    fn fetch(&self, request: FetchRequest) -> BoxFuture<'static, Result<Vec<u8>>> {
        let client = if request.with_credentials {
            self.credentialed.clone()
        } else {
            self.client.clone()
        };
        async move {
            let timeout_ms = request.timeout.as_millis() as u64;
            let map_err = |e: reqwest::Error| {
                if e.is_timeout() {
                    Error::Timeout {
                        url: request.url.clone(),
                        timeout_ms,
                    }
                } else {
                    Error::NetworkError(format!("Failed to fetch {}: {}", request.url, e))
                }
            };

            let response = client
                .get(&request.url)
                .timeout(request.timeout)
                .send()
                .await
                .map_err(map_err)?;

            let status = response.status();
            if !status.is_success() {
                return Err(Error::HttpStatus {
                    url: request.url.clone(),
                    status: status.as_u16(),
                });
            }

            let body = response.bytes().await.map_err(map_err)?;
            log::debug!("fetched {} ({} bytes)", request.url, body.len());
            Ok(body.to_vec())
        }
        .boxed()
    }
}
