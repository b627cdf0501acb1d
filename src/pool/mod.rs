//! Pool Module
//!
//! Miss resolution across the local store, the owning peer, and the origin.

mod cache_pool;
mod context;
mod origin;
mod peer;

pub use cache_pool::{CachePool, CachePoolConfig, DEFAULT_PEER_TIMEOUT, DEFAULT_PORT};
pub use context::Context;
pub use origin::{FnOrigin, HttpOrigin, OriginFetcher};
pub use peer::{peer_url, HttpPeerClient, PeerClient};
