//! Peer Client Module
//!
//! Remote lookup against the peer that owns a key.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::error::{CacheError, Result};
use crate::pool::Context;

// == Peer Client Trait ==
/// Fetches a key from a named peer.
///
/// Implementations must report any non-success answer as an error so the
/// pool can fall through to the origin.
#[async_trait]
pub trait PeerClient: Send + Sync {
    async fn fetch(&self, ctx: &Context, peer: &str, key: &str) -> Result<Bytes>;
}

// == HTTP Peer Client ==
/// Peer client speaking the `GET /<percent-encoded key>` wire protocol.
#[derive(Debug, Clone)]
pub struct HttpPeerClient {
    client: reqwest::Client,
    /// Port appended to peer addresses that carry none
    port: String,
    /// Upper bound for a single peer request
    timeout: Duration,
}

impl HttpPeerClient {
    /// Creates a client with its own connection pool.
    pub fn new(port: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CacheError::Internal(format!("failed to build peer client: {}", e)))?;

        Ok(Self::with_client(client, port, timeout))
    }

    /// Creates a client sharing an existing reqwest client.
    pub fn with_client(client: reqwest::Client, port: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            port: port.into(),
            timeout,
        }
    }
}

#[async_trait]
impl PeerClient for HttpPeerClient {
    async fn fetch(&self, ctx: &Context, peer: &str, key: &str) -> Result<Bytes> {
        let url = peer_url(peer, &self.port, key)?;

        // Never wait longer than the caller is willing to
        let timeout = ctx
            .remaining()
            .map_or(self.timeout, |remaining| remaining.min(self.timeout));
        if timeout.is_zero() {
            return Err(CacheError::Cancelled);
        }

        debug!("Forwarding lookup to peer: {}", url);

        let request = async {
            let response = self
                .client
                .get(&url)
                .timeout(timeout)
                .send()
                .await
                .map_err(|e| CacheError::PeerUnavailable(format!("{}: {}", peer, e)))?;

            let status = response.status();
            if !status.is_success() {
                return Err(CacheError::PeerUnavailable(format!(
                    "{} answered {}",
                    peer, status
                )));
            }

            response
                .bytes()
                .await
                .map_err(|e| CacheError::PeerUnavailable(format!("{}: {}", peer, e)))
        };

        ctx.run(request).await.unwrap_or(Err(CacheError::Cancelled))
    }
}

// == URL Construction ==
/// Builds the lookup URL for `key` on `peer`.
///
/// `http://` is assumed when the address has no scheme, and `port` is
/// appended when the address names a bare host. IPv6 hosts must be bracketed.
pub fn peer_url(peer: &str, port: &str, key: &str) -> Result<String> {
    let peer = peer.trim();
    let (scheme, authority) = match peer.split_once("://") {
        Some((scheme, rest)) => (scheme, rest),
        None => ("http", peer),
    };

    let authority = authority.trim_end_matches('/');
    if authority.is_empty() {
        return Err(CacheError::InvalidPeer(format!("'{}'", peer)));
    }

    let base = if has_port(authority) || port.is_empty() {
        format!("{}://{}", scheme, authority)
    } else {
        format!("{}://{}:{}", scheme, authority, port)
    };

    Ok(format!("{}/{}", base, urlencoding::encode(key)))
}

/// True when `authority` ends in an explicit `:port`.
fn has_port(authority: &str) -> bool {
    let tail = if authority.starts_with('[') {
        authority.rsplit_once("]:").map(|(_, port)| port)
    } else {
        authority.rsplit_once(':').map(|(_, port)| port)
    };

    matches!(tail, Some(port) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()))
}
