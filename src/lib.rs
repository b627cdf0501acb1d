//! dcache - A distributed read-through cache
//!
//! Each node keeps a TTL-bounded local store. A local miss is forwarded to the
//! peer that owns the key on a consistent-hash ring, then to an optional
//! origin, and the answer is backfilled locally.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod pool;
pub mod ring;
pub mod tasks;

pub use api::AppState;
pub use config::Config;
pub use error::CacheError;
pub use pool::{CachePool, CachePoolConfig, Context, OriginFetcher, PeerClient};
pub use tasks::spawn_cleanup_task;
