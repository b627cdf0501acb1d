//! Origin Module
//!
//! The system of record consulted when neither the local store nor the owning peer has a key.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::error::{CacheError, Result};
use crate::pool::Context;

// == Origin Fetcher Trait ==
/// Resolves a key against the system of record.
///
/// Called only after the local and peer stages have missed.
#[async_trait]
pub trait OriginFetcher: Send + Sync {
    async fn fetch(&self, ctx: &Context, key: &str) -> Result<Bytes>;
}

// == Closure Origin ==
/// Adapts a synchronous closure into an [`OriginFetcher`].
pub struct FnOrigin<F>(F);

impl<F> FnOrigin<F>
where
    F: Fn(&str) -> Result<Bytes> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> fmt::Debug for FnOrigin<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnOrigin")
    }
}

#[async_trait]
impl<F> OriginFetcher for FnOrigin<F>
where
    F: Fn(&str) -> Result<Bytes> + Send + Sync,
{
    async fn fetch(&self, _ctx: &Context, key: &str) -> Result<Bytes> {
        (self.0)(key)
    }
}

// == HTTP Origin ==
/// Origin served by an HTTP service answering `GET {base_url}/{key}`.
#[derive(Debug, Clone)]
pub struct HttpOrigin {
    client: reqwest::Client,
    base_url: String,
}

impl HttpOrigin {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CacheError::Internal(format!("failed to build origin client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl OriginFetcher for HttpOrigin {
    async fn fetch(&self, ctx: &Context, key: &str) -> Result<Bytes> {
        let url = format!("{}/{}", self.base_url, urlencoding::encode(key));
        debug!("Fetching from origin: {}", url);

        let request = async {
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| CacheError::OriginFetch(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(CacheError::OriginFetch(format!("{} answered {}", url, status)));
            }

            response
                .bytes()
                .await
                .map_err(|e| CacheError::OriginFetch(e.to_string()))
        };

        ctx.run(request).await.unwrap_or(Err(CacheError::Cancelled))
    }
}
