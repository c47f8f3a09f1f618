//! Juris legal-process sync service.
//!
//! Exposes the manual sync trigger, case sync status and the provider
//! webhook endpoint over HTTP.

mod config;
mod logging;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Json, Router};
use config::Config;
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::info;

use juris_api_sync::{sync_router, SyncApiState};
use juris_sync::{
    CredentialResolver, PgPlanLimits, ReqwestProviderFactory, SyncOrchestrator,
};

#[tokio::main]
async fn main() {
    // Load configuration (fail-fast on missing required values)
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    logging::init_logging(&config.rust_log);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.host,
        port = config.port,
        provider = %config.provider,
        "Starting juris sync API"
    );

    let pool = match PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await
    {
        Ok(p) => p,
        Err(e) => {
            tracing::error!("Failed to connect to database: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = juris_db::run_migrations(&pool).await {
        tracing::error!("Failed to run migrations: {e}");
        std::process::exit(1);
    }
    info!("Database migrations applied");

    let resolver = CredentialResolver::new(pool.clone(), config.provider.clone())
        .with_legacy_fallback(config.credential_fallback);
    let limits = Arc::new(PgPlanLimits::new(pool.clone()));
    let factory = Arc::new(
        ReqwestProviderFactory::new()
            .with_retry(config.provider_max_retries, config.provider_backoff_base_ms),
    );
    let orchestrator = Arc::new(
        SyncOrchestrator::new(pool.clone(), resolver, limits, factory)
            .with_polling(config.poll_interval, config.poll_max_attempts),
    );

    let state = SyncApiState::new(pool, orchestrator);

    let app = Router::new()
        .route("/health", get(health_handler))
        .merge(sync_router(state))
        .layer(TraceLayer::new_for_http());

    let addr = match format!("{}:{}", config.host, config.port).parse::<SocketAddr>() {
        Ok(a) => a,
        Err(e) => {
            tracing::error!("Invalid bind address: {e}");
            std::process::exit(1);
        }
    };
    info!(%addr, "Server listening");

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to bind to address {addr}: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Server error: {e}");
        std::process::exit(1);
    }

    info!("Server shutdown complete");
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
