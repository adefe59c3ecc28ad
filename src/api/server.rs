use axum::{
    routing::{delete, get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    analyze, clear_table, get_cache_entry, health_check, invalidate, metrics, register,
    should_invalidate, stats, AppState,
};
use crate::cache::Cache;
use crate::config::Config;

/// Build the application router
pub fn build_router(state: Arc<AppState>, cors_enabled: bool) -> Router {
    let mut router = Router::new()
        .route("/health", get(health_check))
        .route("/analyze", post(analyze))
        .route("/register", post(register))
        .route("/cache/:fingerprint", get(get_cache_entry))
        .route("/invalidate", post(invalidate))
        .route("/should-invalidate", post(should_invalidate))
        .route("/table/:name", delete(clear_table))
        .route("/stats", get(stats))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http());

    if cors_enabled {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    router.with_state(state)
}

/// Run the HTTP server until a shutdown signal arrives, then flush the
/// store before returning.
pub async fn run_server(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let cache = Arc::new(Cache::open(&config.db_path, config.hot_capacity)?);
    let state = Arc::new(AppState {
        cache: Arc::clone(&cache),
        started_at: Instant::now(),
    });

    let app = build_router(state, config.cors_enabled);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("Starting Cadabra server on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cache.close()?;
    tracing::info!("Cadabra server stopped");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install CTRL+C signal handler");
    tracing::info!("shutdown signal received");
}
