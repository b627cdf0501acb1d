//! dcache - A distributed read-through cache node
//!
//! Serves the wire endpoint for its peers and clients, forwarding misses to
//! the owning peer and the configured origin.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context as _;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dcache::api::{create_router, AppState};
use dcache::{spawn_cleanup_task, Config};

/// Main entry point for a dcache node.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build the cache pool and place configured peers on the ring
/// 4. Start background TTL cleanup task
/// 5. Serve the wire endpoint on the configured port
/// 6. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dcache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting dcache node");

    let config = Config::from_env();
    info!(
        "Configuration loaded: port={}, ttl={}s, peers={:?}, replicas={}, origin={:?}",
        config.port, config.ttl_secs, config.peers, config.replicas, config.origin_url
    );

    let state = AppState::from_config(&config).context("failed to build cache pool")?;
    info!("Cache pool initialized with {} peers", state.pool.peers().len());

    let cleanup_handle = (config.cleanup_interval > 0).then(|| {
        spawn_cleanup_task(
            state.pool.local().clone(),
            Duration::from_secs(config.cleanup_interval),
        )
    });

    let app = create_router(state.clone());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port)
        .parse()
        .with_context(|| format!("invalid port: {}", config.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cleanup_handle))
        .await
        .context("server error")?;

    let stats = state.pool.stats();
    info!(
        "Server shutdown complete: local_hits={}, peer_hits={}, origin_hits={}, misses={}",
        stats.local_hits, stats.peer_hits, stats.origin_hits, stats.misses
    );
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the cleanup task and allows graceful shutdown.
async fn shutdown_signal(cleanup_handle: Option<tokio::task::JoinHandle<()>>) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    if let Some(handle) = cleanup_handle {
        handle.abort();
        warn!("Cleanup task aborted");
    }
}
