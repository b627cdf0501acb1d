//! Configuration Module
//!
//! Handles loading and managing node configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::Result;
use crate::pool::{CachePoolConfig, HttpOrigin, DEFAULT_PORT};
use crate::ring::DEFAULT_REPLICAS;

/// Node configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Listening and advertised port
    pub port: String,
    /// TTL in seconds for every cached entry, 0 = never expire
    pub ttl_secs: u64,
    /// Peer addresses placed on the ring at startup
    pub peers: Vec<String>,
    /// Virtual nodes per peer
    pub replicas: usize,
    /// Upper bound for a single peer or origin request, in milliseconds
    pub peer_timeout_ms: u64,
    /// Base URL of an HTTP origin, if any
    pub origin_url: Option<String>,
    /// Background sweep frequency in seconds, 0 = lazy eviction only
    pub cleanup_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `DCACHE_PORT` - Port (default: 9929)
    /// - `DCACHE_TTL_SECS` - Entry TTL in seconds (default: 0, never expire)
    /// - `DCACHE_PEERS` - Comma-separated peer addresses (default: none)
    /// - `DCACHE_REPLICAS` - Virtual nodes per peer (default: 40)
    /// - `DCACHE_PEER_TIMEOUT_MS` - Request timeout in milliseconds (default: 2000)
    /// - `DCACHE_ORIGIN_URL` - HTTP origin base URL (default: none)
    /// - `DCACHE_CLEANUP_INTERVAL_SECS` - Sweep frequency in seconds (default: 30)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            port: env::var("DCACHE_PORT")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.port),
            ttl_secs: parse_env("DCACHE_TTL_SECS").unwrap_or(defaults.ttl_secs),
            peers: env::var("DCACHE_PEERS")
                .map(|v| parse_peers(&v))
                .unwrap_or(defaults.peers),
            replicas: parse_env("DCACHE_REPLICAS").unwrap_or(defaults.replicas),
            peer_timeout_ms: parse_env("DCACHE_PEER_TIMEOUT_MS")
                .unwrap_or(defaults.peer_timeout_ms),
            origin_url: env::var("DCACHE_ORIGIN_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            cleanup_interval: parse_env("DCACHE_CLEANUP_INTERVAL_SECS")
                .unwrap_or(defaults.cleanup_interval),
        }
    }

    pub fn ttl(&self) -> Option<Duration> {
        (self.ttl_secs > 0).then(|| Duration::from_secs(self.ttl_secs))
    }

    pub fn peer_timeout(&self) -> Duration {
        Duration::from_millis(self.peer_timeout_ms)
    }

    /// Builds the pool configuration, including the HTTP origin when one is set.
    pub fn pool_config(&self) -> Result<CachePoolConfig> {
        let mut config = CachePoolConfig::default()
            .with_port(self.port.clone())
            .with_replicas(self.replicas)
            .with_peer_timeout(self.peer_timeout());
        config.ttl = self.ttl();

        if let Some(url) = &self.origin_url {
            config = config.with_origin(HttpOrigin::new(url.clone(), self.peer_timeout())?);
        }

        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.to_string(),
            ttl_secs: 0,
            peers: Vec::new(),
            replicas: DEFAULT_REPLICAS,
            peer_timeout_ms: 2000,
            origin_url: None,
            cleanup_interval: 30,
        }
    }
}

fn parse_env<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

/// Splits a comma-separated peer list, dropping blanks.
pub fn parse_peers(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|peer| !peer.is_empty())
        .map(str::to_string)
        .collect()
}
