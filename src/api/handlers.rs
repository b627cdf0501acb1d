//! API Handlers
//!
//! Wire endpoint answering `GET /<percent-encoded key>` from the local store and origin.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
};
use tracing::debug;

use crate::config::Config;
use crate::error::Result;
use crate::pool::{CachePool, Context};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The node's cache pool
    pub pool: Arc<CachePool>,
}

impl AppState {
    /// Creates a new AppState around an existing pool.
    pub fn new(pool: CachePool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Builds the pool described by the configuration and joins its peers.
    pub fn from_config(config: &Config) -> Result<Self> {
        let pool = CachePool::new(config.pool_config()?)?;
        pool.add_peers(&config.peers);
        Ok(Self::new(pool))
    }
}

/// Handler for GET /:key
///
/// Answers from the local store, then the origin. Never forwards to another
/// peer. An absent key with no origin configured is a 200 with an empty body;
/// an origin failure is a 404 carrying the error text.
pub async fn lookup_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Bytes> {
    debug!("Wire lookup: {}", key);

    // Axum drops this future if the caller disconnects, which aborts the origin call
    let ctx = Context::background();
    let value = state.pool.serve_local(&ctx, &key).await?;

    Ok(value.unwrap_or_default())
}
