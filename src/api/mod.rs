//! API Module
//!
//! HTTP wire endpoint through which peers and clients look keys up.
//!
//! # Endpoints
//! - `GET /:key` - Look up a percent-encoded key (local store, then origin)
//!
//! Keys are non-empty and travel as one path segment; `/` inside a key must
//! be sent as `%2F`.

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
