//! API Routes
//!
//! Configures the Axum router for the wire endpoint.

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use super::handlers::{lookup_handler, AppState};

/// Creates the router serving `GET /:key`.
///
/// The key segment is percent-decoded by the path extractor, so `/user%3A42`
/// looks up `user:42`. A key must be non-empty and sent as a single segment:
/// `GET /` and an unencoded `/a/b` match no route and get a bare 404, which
/// is why [`peer_url`](crate::pool::peer_url) encodes `/` as `%2F`. Requests
/// are logged through the tracing layer.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/:key", get(lookup_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
