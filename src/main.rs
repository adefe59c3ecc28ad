//! Cadabra Server
//!
//! Run with: cargo run
//!
//! Environment variables:
//! - HOST: Bind address (default: 0.0.0.0)
//! - PORT: Port number (default: 8080)
//! - DB_PATH: Directory for the sled store (default: ./cadabra-data)
//! - HOT_CAPACITY: Max entries in the in-process hot cache (default: 10000)
//! - CORS_ENABLED: Enable permissive CORS (default: true)
//! - LOG_LEVEL: Log level (default: info)

use cadabra::api::run_server;
use cadabra::config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("cadabra={},tower_http=info", Config::log_level()).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env_and_args(std::env::args().skip(1));

    tracing::info!("Cadabra configuration:");
    tracing::info!("  Host: {}:{}", config.host, config.port);
    tracing::info!("  Store path: {}", config.db_path);
    tracing::info!("  Hot cache capacity: {}", config.hot_capacity);
    tracing::info!("  CORS enabled: {}", config.cors_enabled);

    run_server(config).await
}
