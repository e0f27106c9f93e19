//! Reflect Backend Service
//!
//! Main entry point for the spending reflection backend.
//! This service provides:
//! - HTTP API for transactions, patterns, deviations, insights and stories
//! - Background detection scheduler (optional)

use reflect_backend::api::create_router;
use reflect_backend::database::{create_pool, run_migrations, Database};
use reflect_backend::narrative;
use reflect_backend::storage::PgStorage;
use reflect_backend::{AppConfig, AppError, AppResult, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "reflect_backend={},sqlx=warn,tower_http=info",
            config.log_level
        )
        .into()
    });

    if config.is_production() {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load environment variables first
    dotenv::dotenv().ok();

    // Load configuration
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        AppError::Config(e)
    })?;

    init_tracing(&config);

    info!("Reflect backend starting");
    info!("Environment: {}", config.environment);
    info!("Log level: {}", config.log_level);
    info!(
        "Detection: {} day window, {} baseline weeks, {} day cooldown, local offset {}",
        config.detection.window_days,
        config.detection.baseline_weeks,
        config.detection.cooldown_days,
        config.detection.utc_offset
    );

    // =========================================================================
    // DATABASE SETUP
    // =========================================================================
    info!("Connecting to database...");

    let pool = create_pool(&config.database).await.map_err(|e| {
        error!("Failed to create database pool: {}", e);
        AppError::Database(e)
    })?;

    info!("Max connections: {}", config.database.max_connections);

    run_migrations(&pool, None).await.map_err(|e| {
        error!("Database migration failed: {}", e);
        AppError::Database(e)
    })?;

    // =========================================================================
    // SERVICES
    // =========================================================================
    let text_generator = narrative::text_generator(&config.narrative).map_err(|e| {
        error!("Failed to initialise text generator: {}", e);
        AppError::Config(e.to_string())
    })?;

    let storage = Arc::new(PgStorage::new(pool.clone()));
    let state = AppState::new(storage, &config, text_generator)
        .with_database(Database::new(pool.clone()));
    info!(
        "✓ Services initialized (narrative strategy: {})",
        config.narrative.provider.as_str()
    );

    let scheduler_handle = if config.scheduler.is_enabled() {
        let scheduler = state.scheduler(config.scheduler.clone());
        info!(
            "✓ Detection scheduler started ({}s interval)",
            config.scheduler.interval_secs
        );
        Some(tokio::spawn(scheduler.start()))
    } else {
        warn!("SCHEDULER_INTERVAL_SECS is 0 - detection runs only on request");
        None
    };

    // =========================================================================
    // HTTP SERVER
    // =========================================================================
    let addr: SocketAddr = format!("0.0.0.0:{}", config.http_port)
        .parse()
        .map_err(|e| AppError::Config(format!("Invalid HTTP address: {}", e)))?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::Message(format!("Failed to bind HTTP server: {}", e)))?;

    let router = create_router(state);
    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            error!("HTTP server error: {}", e);
        }
    });

    info!("✓ HTTP API listening on {}", addr);
    info!("Press Ctrl+C to shutdown gracefully");

    // =========================================================================
    // SHUTDOWN HANDLING
    // =========================================================================
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, shutting down gracefully...");
        }
        _ = server_handle => {
            error!("HTTP server exited unexpectedly");
        }
        _ = async {
            if let Some(handle) = scheduler_handle {
                handle.await.ok();
            } else {
                // Never completes if the scheduler is not running
                futures::future::pending::<()>().await;
            }
        } => {
            error!("Detection scheduler exited unexpectedly");
        }
    }

    pool.close().await;
    info!("Reflect backend shutdown complete");
    Ok(())
}
