//! tempo-gateway server entry point.
//!
//! Starts the Axum HTTP server over either in-memory or PostgreSQL stores.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use tempo_gateway::api;
use tempo_gateway::app_state::AppState;
use tempo_gateway::config::GatewayConfig;
use tempo_gateway::store::{PostgresPermissionStore, PostgresVersionStore, RetryPolicy};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = GatewayConfig::from_env().context("invalid LISTEN_ADDR")?;
    tracing::info!(addr = %config.listen_addr, "starting tempo-gateway");

    let app_state = if config.persistence_enabled {
        postgres_state(&config).await?
    } else {
        tracing::warn!("persistence disabled, history lives in memory only");
        AppState::in_memory()
    };

    let app = api::build_app(app_state, Duration::from_secs(config.request_timeout_secs));

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn postgres_state(config: &GatewayConfig) -> anyhow::Result<AppState> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .min_connections(config.database_min_connections)
        .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
        .connect(&config.database_url)
        .await
        .context("connecting to PostgreSQL")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("running migrations")?;
    tracing::info!("database migrations applied");

    let retry = RetryPolicy::from(config);
    Ok(AppState::new(
        Arc::new(PostgresVersionStore::new(pool.clone(), retry)),
        Arc::new(PostgresPermissionStore::new(pool, retry)),
    ))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
