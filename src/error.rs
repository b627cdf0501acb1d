//! Error types for the cache pool
//!
//! Provides unified error handling using thiserror. None of these reach the
//! caller of `CachePool::get`; they are logged and the lookup degrades to a miss.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache pool.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Transport failure or non-success response from the owning peer
    #[error("Peer unavailable: {0}")]
    PeerUnavailable(String),

    /// The configured origin failed to resolve the key
    #[error("Origin fetch failed: {0}")]
    OriginFetch(String),

    /// The lookup context was cancelled or its deadline passed
    #[error("Lookup cancelled")]
    Cancelled,

    /// Peer address could not be turned into a request URL
    #[error("Invalid peer address: {0}")]
    InvalidPeer(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::OriginFetch(_) | CacheError::Cancelled => StatusCode::NOT_FOUND,
            CacheError::PeerUnavailable(_) => StatusCode::BAD_GATEWAY,
            CacheError::InvalidPeer(_) => StatusCode::BAD_REQUEST,
            CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Bare key->bytes protocol: the body is the error text, nothing else
        (status, self.to_string()).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache pool.
pub type Result<T> = std::result::Result<T, CacheError>;
