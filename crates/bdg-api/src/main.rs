//! # bdg-api: Binary Entry Point
//!
//! Starts the Axum HTTP server. Configuration comes from `BADGE_*`
//! environment variables and `DATABASE_URL`; see [`bdg_api::config`].

use bdg_api::config::{ApiConfig, LogFormat};
use bdg_api::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ApiConfig::from_env()?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }

    // Optional; absent means in-memory only.
    let db_pool = bdg_api::db::init_pool(config.database_url.as_ref())
        .await
        .map_err(|e| {
            tracing::error!("Database initialization failed: {e}");
            e
        })?;

    let addr = config.bind_addr;
    let state = AppState::new(config, db_pool).map_err(|e| {
        tracing::error!("Startup failed: {e}");
        e
    })?;
    let app = bdg_api::app(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("badge trust core listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
