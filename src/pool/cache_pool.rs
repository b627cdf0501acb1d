//! Cache Pool Module
//!
//! Resolves lookups through the local store, the owning peer, and the origin,
//! backfilling the local store with whatever a later stage returns.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::cache::{CacheStats, LocalStore, StatsRecorder};
use crate::error::{CacheError, Result};
use crate::pool::{Context, HttpPeerClient, OriginFetcher, PeerClient};
use crate::ring::{HashRing, DEFAULT_REPLICAS};

/// Port used when none is configured
pub const DEFAULT_PORT: &str = "9929";

/// Upper bound for a single peer request
pub const DEFAULT_PEER_TIMEOUT: Duration = Duration::from_secs(2);

// == Cache Pool Config ==
/// Construction parameters for a [`CachePool`]. Immutable once the pool is built.
#[derive(Clone)]
pub struct CachePoolConfig {
    /// TTL applied to every write; `None` or zero means entries never expire
    pub ttl: Option<Duration>,
    /// Advertised port, appended to peer addresses that carry none
    pub port: String,
    /// Virtual nodes per peer on the ring
    pub replicas: usize,
    /// Upper bound for a single peer request
    pub peer_timeout: Duration,
    /// System of record; `None` disables the origin stage
    pub origin: Option<Arc<dyn OriginFetcher>>,
}

impl CachePoolConfig {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_port(mut self, port: impl Into<String>) -> Self {
        self.port = port.into();
        self
    }

    pub fn with_replicas(mut self, replicas: usize) -> Self {
        self.replicas = replicas;
        self
    }

    pub fn with_peer_timeout(mut self, timeout: Duration) -> Self {
        self.peer_timeout = timeout;
        self
    }

    pub fn with_origin(mut self, origin: impl OriginFetcher + 'static) -> Self {
        self.origin = Some(Arc::new(origin));
        self
    }
}

impl Default for CachePoolConfig {
    fn default() -> Self {
        Self {
            ttl: None,
            port: DEFAULT_PORT.to_string(),
            replicas: DEFAULT_REPLICAS,
            peer_timeout: DEFAULT_PEER_TIMEOUT,
            origin: None,
        }
    }
}

impl fmt::Debug for CachePoolConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachePoolConfig")
            .field("ttl", &self.ttl)
            .field("port", &self.port)
            .field("replicas", &self.replicas)
            .field("peer_timeout", &self.peer_timeout)
            .field("origin", &self.origin.is_some())
            .finish()
    }
}

// == Cache Pool ==
/// One node's view of the distributed cache.
pub struct CachePool {
    local: Arc<LocalStore>,
    ring: RwLock<HashRing>,
    peer_client: Arc<dyn PeerClient>,
    origin: Option<Arc<dyn OriginFetcher>>,
    ttl: Option<Duration>,
    port: String,
    stats: StatsRecorder,
}

impl CachePool {
    // == Constructors ==
    /// Creates a pool talking to peers over HTTP.
    pub fn new(config: CachePoolConfig) -> Result<Self> {
        let port = effective_port(&config.port);
        let peer_client = HttpPeerClient::new(port.clone(), config.peer_timeout)?;
        Ok(Self::with_peer_client(config, Arc::new(peer_client)))
    }

    /// Creates a pool using a caller-supplied peer transport.
    pub fn with_peer_client(config: CachePoolConfig, peer_client: Arc<dyn PeerClient>) -> Self {
        Self {
            local: Arc::new(LocalStore::new()),
            ring: RwLock::new(HashRing::new(config.replicas)),
            peer_client,
            origin: config.origin,
            ttl: config.ttl,
            port: effective_port(&config.port),
            stats: StatsRecorder::new(),
        }
    }

    // == Peers ==
    /// Adds peers to the ring. Safe to call while lookups are in flight.
    pub fn add_peers<I, S>(&self, peers: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ring = self.ring.write();
        for peer in peers {
            let peer = peer.as_ref();
            if ring.add(peer) {
                info!("Peer added to ring: {}", peer);
            }
        }
    }

    /// Returns the peers on the ring in sorted order.
    pub fn peers(&self) -> Vec<String> {
        self.ring.read().peers().map(str::to_owned).collect()
    }

    /// Returns the peer owning `key`, if any peers are configured.
    pub fn owner_of(&self, key: &str) -> Option<String> {
        self.ring.read().resolve(key).map(str::to_owned)
    }

    // == Get ==
    /// Looks a key up locally, then on its owning peer, then at the origin.
    ///
    /// Peer and origin results are written back to the local store. Every
    /// failure, including cancellation of `ctx`, degrades to `None`.
    pub async fn get(&self, ctx: &Context, key: &str) -> Option<Bytes> {
        if let Some(value) = self.local.get(key) {
            self.stats.record_local_hit();
            debug!("Local hit: {}", key);
            return Some(value);
        }

        if let Some(peer) = self.owner_of(key) {
            // Enforced here as well, a transport may not watch ctx itself
            let result = ctx
                .run(self.peer_client.fetch(ctx, &peer, key))
                .await
                .unwrap_or(Err(CacheError::Cancelled));

            match result {
                Ok(value) => {
                    self.backfill(key, value.clone());
                    self.stats.record_peer_hit();
                    debug!("Peer hit: {} from {}", key, peer);
                    return Some(value);
                }
                Err(err) => {
                    self.stats.record_peer_error();
                    warn!("Peer lookup failed for {}: {}", key, err);
                }
            }
        }

        if ctx.is_cancelled() {
            self.stats.record_miss();
            debug!("Lookup cancelled: {}", key);
            return None;
        }

        match self.fetch_origin(ctx, key).await {
            Some(Ok(value)) => Some(value),
            _ => {
                self.stats.record_miss();
                debug!("Miss: {}", key);
                None
            }
        }
    }

    // == Serve Local ==
    /// Answers a lookup on behalf of a peer or client: local store, then origin.
    ///
    /// Never consults the ring, so two peers that each think the other owns a
    /// key cannot forward to one another forever.
    ///
    /// # Returns
    /// - `Ok(Some(value))` on a local or origin hit
    /// - `Ok(None)` when the key is absent and no origin is configured
    /// - `Err(_)` when the origin failed or `ctx` fired
    pub async fn serve_local(&self, ctx: &Context, key: &str) -> Result<Option<Bytes>> {
        if let Some(value) = self.local.get(key) {
            self.stats.record_local_hit();
            return Ok(Some(value));
        }

        match self.fetch_origin(ctx, key).await {
            Some(result) => result.map(Some),
            None => {
                self.stats.record_miss();
                Ok(None)
            }
        }
    }

    // == Origin ==
    /// Runs the origin stage. Returns None when no origin is configured.
    async fn fetch_origin(&self, ctx: &Context, key: &str) -> Option<Result<Bytes>> {
        let origin = self.origin.as_ref()?;

        let result = ctx
            .run(origin.fetch(ctx, key))
            .await
            .unwrap_or(Err(CacheError::Cancelled));

        match &result {
            Ok(value) => {
                self.backfill(key, value.clone());
                self.stats.record_origin_hit();
                debug!("Origin hit: {}", key);
            }
            Err(err) => {
                self.stats.record_origin_error();
                warn!("Origin fetch failed for {}: {}", key, err);
            }
        }

        Some(result)
    }

    fn backfill(&self, key: &str, value: Bytes) {
        self.local.set(key, value, self.ttl);
    }

    // == Direct Access ==
    /// Writes a value into the local store with the pool TTL.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Bytes>) {
        self.local.set(key, value, self.ttl);
    }

    /// Removes a key from the local store only.
    pub fn delete(&self, key: &str) {
        self.local.delete(key);
    }

    /// Shared handle to the local store.
    pub fn local(&self) -> &Arc<LocalStore> {
        &self.local
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.local.len())
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn has_origin(&self) -> bool {
        self.origin.is_some()
    }
}

impl fmt::Debug for CachePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachePool")
            .field("ttl", &self.ttl)
            .field("port", &self.port)
            .field("peers", &self.ring.read().len())
            .field("origin", &self.origin.is_some())
            .field("entries", &self.local.len())
            .finish()
    }
}

fn effective_port(port: &str) -> String {
    if port.trim().is_empty() {
        DEFAULT_PORT.to_string()
    } else {
        port.trim().to_string()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const KEY: &str = "2d8b59ca-fce0-4645-8de3-ec88f899656f";
    const DATA: &[u8] = b"Cras ac lectus ut lectus";

    // == Fakes ==
    #[derive(Default)]
    struct FakePeer {
        value: Option<Bytes>,
        hang: bool,
        /// Answers only after this delay, without looking at ctx
        delay: Option<Duration>,
        calls: AtomicUsize,
        last_peer: parking_lot::Mutex<Option<String>>,
    }

    impl FakePeer {
        fn answering(value: &'static [u8]) -> Arc<Self> {
            Arc::new(Self {
                value: Some(Bytes::from_static(value)),
                ..Self::default()
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self::default())
        }

        fn hanging() -> Arc<Self> {
            Arc::new(Self {
                hang: true,
                ..Self::default()
            })
        }

        fn slow(value: &'static [u8], delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                value: Some(Bytes::from_static(value)),
                delay: Some(delay),
                ..Self::default()
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PeerClient for FakePeer {
        async fn fetch(&self, ctx: &Context, peer: &str, _key: &str) -> Result<Bytes> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_peer.lock() = Some(peer.to_string());
            if self.hang {
                return ctx
                    .run(std::future::pending::<Result<Bytes>>())
                    .await
                    .unwrap_or(Err(CacheError::Cancelled));
            }
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.value
                .clone()
                .ok_or_else(|| CacheError::PeerUnavailable(format!("{} answered 404", peer)))
        }
    }

    #[derive(Clone, Default)]
    struct FakeOrigin {
        value: Option<Bytes>,
        calls: Arc<AtomicUsize>,
    }

    impl FakeOrigin {
        fn answering(value: &'static [u8]) -> Self {
            Self {
                value: Some(Bytes::from_static(value)),
                ..Self::default()
            }
        }

        fn failing() -> Self {
            Self::default()
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl OriginFetcher for FakeOrigin {
        async fn fetch(&self, _ctx: &Context, key: &str) -> Result<Bytes> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.value
                .clone()
                .ok_or_else(|| CacheError::OriginFetch(format!("no row for {}", key)))
        }
    }

    fn config() -> CachePoolConfig {
        CachePoolConfig::default().with_ttl(Duration::from_secs(30))
    }

    fn pool(config: CachePoolConfig, peer: &Arc<FakePeer>) -> CachePool {
        CachePool::with_peer_client(config, peer.clone())
    }

    // == Construction ==
    #[test]
    fn test_default_pool() {
        let pool = CachePool::new(CachePoolConfig::default()).unwrap();

        assert_eq!(pool.ttl(), None);
        assert_eq!(pool.port(), "9929");
        assert!(!pool.has_origin());
        assert!(pool.peers().is_empty());
    }

    #[test]
    fn test_custom_pool() {
        let config = CachePoolConfig::default()
            .with_port("30345")
            .with_ttl(Duration::from_secs(30))
            .with_origin(FakeOrigin::failing());
        let pool = CachePool::new(config).unwrap();

        assert_eq!(pool.ttl(), Some(Duration::from_secs(30)));
        assert_eq!(pool.port(), "30345");
        assert!(pool.has_origin());
    }

    #[test]
    fn test_blank_port_falls_back_to_default() {
        let pool = CachePool::new(CachePoolConfig::default().with_port("")).unwrap();
        assert_eq!(pool.port(), DEFAULT_PORT);
    }

    #[test]
    fn test_add_peers_deduplicates() {
        let pool = pool(config(), &FakePeer::failing());
        pool.add_peers(["b:2", "a:1"]);
        pool.add_peers(vec!["a:1".to_string()]);

        assert_eq!(pool.peers(), vec!["a:1", "b:2"]);
    }

    // == Lookup Stages ==
    #[tokio::test]
    async fn test_local_hit_skips_peer_and_origin() {
        let peer = FakePeer::answering(b"from-peer");
        let origin = FakeOrigin::answering(b"from-origin");
        let pool = pool(config().with_origin(origin.clone()), &peer);
        pool.add_peers(["a:1"]);

        pool.set(KEY, DATA);
        let value = pool.get(&Context::background(), KEY).await;

        assert_eq!(value, Some(Bytes::from_static(DATA)));
        assert_eq!(peer.calls(), 0);
        assert_eq!(origin.calls(), 0);
        assert_eq!(pool.stats().local_hits, 1);
    }

    #[tokio::test]
    async fn test_peer_hit_backfills_local() {
        let peer = FakePeer::answering(DATA);
        let pool = pool(config(), &peer);
        pool.add_peers(["a:1", "b:2", "c:3"]);

        let first = pool.get(&Context::background(), KEY).await;
        let second = pool.get(&Context::background(), KEY).await;

        assert_eq!(first, Some(Bytes::from_static(DATA)));
        assert_eq!(second, first);
        assert_eq!(peer.calls(), 1);
        assert_eq!(pool.local().get(KEY), first);

        // The request went to the ring-resolved owner
        assert_eq!(*peer.last_peer.lock(), pool.owner_of(KEY));
    }

    #[tokio::test]
    async fn test_peer_failure_falls_back_to_origin() {
        let peer = FakePeer::failing();
        let origin = FakeOrigin::answering(b"Bob");
        let pool = pool(config().with_origin(origin.clone()), &peer);
        pool.add_peers(["a:1", "b:2"]);

        let value = pool.get(&Context::background(), "user:42").await;

        assert_eq!(value, Some(Bytes::from_static(b"Bob")));
        assert_eq!(peer.calls(), 1, "exactly one peer is tried");
        assert_eq!(origin.calls(), 1);

        let stats = pool.stats();
        assert_eq!(stats.peer_errors, 1);
        assert_eq!(stats.origin_hits, 1);
    }

    #[tokio::test]
    async fn test_no_peers_origin_backfills() {
        let peer = FakePeer::failing();
        let origin = FakeOrigin::answering(DATA);
        let pool = pool(config().with_origin(origin.clone()), &peer);

        let value = pool.get(&Context::background(), KEY).await;

        assert_eq!(value, Some(Bytes::from_static(DATA)));
        assert_eq!(peer.calls(), 0);
        assert_eq!(pool.local().get(KEY), Some(Bytes::from_static(DATA)));

        pool.get(&Context::background(), KEY).await;
        assert_eq!(origin.calls(), 1);
    }

    #[tokio::test]
    async fn test_origin_failure_is_a_miss() {
        let peer = FakePeer::failing();
        let origin = FakeOrigin::failing();
        let pool = pool(config().with_origin(origin.clone()), &peer);

        assert!(pool.get(&Context::background(), KEY).await.is_none());
        assert!(pool.local().is_empty());

        // The pool stays usable afterwards
        pool.set(KEY, DATA);
        assert!(pool.get(&Context::background(), KEY).await.is_some());
    }

    #[tokio::test]
    async fn test_empty_pool_always_misses() {
        let peer = FakePeer::failing();
        let pool = pool(CachePoolConfig::default(), &peer);

        for i in 0..20 {
            let key = format!("key-{}", i);
            assert!(pool.get(&Context::background(), &key).await.is_none());
        }
        assert_eq!(pool.stats().misses, 20);
        assert_eq!(peer.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_peer_call_returns_promptly() {
        let peer = FakePeer::hanging();
        let origin = FakeOrigin::answering(DATA);
        let pool = pool(config().with_origin(origin.clone()), &peer);
        pool.add_peers(["a:1"]);

        let ctx = Context::with_timeout(Duration::from_millis(200));
        let value = pool.get(&ctx, KEY).await;

        assert!(value.is_none());
        assert_eq!(peer.calls(), 1);
        assert_eq!(origin.calls(), 0, "origin is skipped once the context fired");
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_cuts_off_peer_ignoring_context() {
        let peer = FakePeer::slow(b"late", Duration::from_secs(60));
        let origin = FakeOrigin::answering(DATA);
        let pool = pool(config().with_origin(origin.clone()), &peer);
        pool.add_peers(["a:1"]);

        let started = tokio::time::Instant::now();
        let ctx = Context::with_timeout(Duration::from_millis(100));
        let value = pool.get(&ctx, KEY).await;

        assert!(value.is_none());
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(peer.calls(), 1);
        assert_eq!(origin.calls(), 0);
        assert!(pool.local().get(KEY).is_none(), "late value must not be backfilled");
        assert_eq!(pool.stats().peer_errors, 1);
    }

    #[tokio::test]
    async fn test_cancelled_context_skips_origin() {
        let peer = FakePeer::failing();
        let origin = FakeOrigin::answering(DATA);
        let pool = pool(config().with_origin(origin.clone()), &peer);

        let ctx = Context::background();
        ctx.cancel();

        assert!(pool.get(&ctx, KEY).await.is_none());
        assert_eq!(origin.calls(), 0);
        assert!(pool.local().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_entry_expires_after_ttl() {
        let peer = FakePeer::failing();
        let pool = pool(config(), &peer);

        pool.set("user:42", "Alice");
        assert_eq!(
            pool.get(&Context::background(), "user:42").await,
            Some(Bytes::from_static(b"Alice"))
        );

        tokio::time::sleep(Duration::from_secs(31)).await;

        assert!(pool.get(&Context::background(), "user:42").await.is_none());
        assert!(!pool.local().contains_key("user:42"));
    }

    // == Serve Local ==
    #[tokio::test]
    async fn test_serve_local_never_consults_ring() {
        let peer = FakePeer::answering(DATA);
        let pool = pool(config(), &peer);
        pool.add_peers(["a:1", "b:2"]);

        let result = pool.serve_local(&Context::background(), KEY).await;

        assert_eq!(result, Ok(None));
        assert_eq!(peer.calls(), 0);
    }

    #[tokio::test]
    async fn test_serve_local_surfaces_origin_error() {
        let peer = FakePeer::failing();
        let pool = pool(config().with_origin(FakeOrigin::failing()), &peer);

        let result = pool.serve_local(&Context::background(), KEY).await;

        assert!(matches!(result, Err(CacheError::OriginFetch(_))));
    }

    #[tokio::test]
    async fn test_serve_local_backfills_from_origin() {
        let peer = FakePeer::failing();
        let origin = FakeOrigin::answering(DATA);
        let pool = pool(config().with_origin(origin.clone()), &peer);

        let result = pool.serve_local(&Context::background(), KEY).await;

        assert_eq!(result, Ok(Some(Bytes::from_static(DATA))));
        assert_eq!(pool.local().get(KEY), Some(Bytes::from_static(DATA)));
    }

    #[tokio::test]
    async fn test_concurrent_gets_with_add_peers() {
        let peer = FakePeer::answering(DATA);
        let pool = Arc::new(pool(config(), &peer));
        pool.add_peers(["a:1"]);

        let lookups: Vec<_> = (0..32)
            .map(|i| {
                let pool = Arc::clone(&pool);
                tokio::spawn(async move {
                    pool.get(&Context::background(), &format!("key-{}", i)).await
                })
            })
            .collect();
        pool.add_peers(["b:2", "c:3"]);

        for lookup in lookups {
            assert_eq!(lookup.await.unwrap(), Some(Bytes::from_static(DATA)));
        }
        assert_eq!(pool.peers().len(), 3);
    }
}
