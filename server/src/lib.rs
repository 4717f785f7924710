//! Flash-sale allocation service.
//!
//! Wires the Postgres durable store, the Redis admission gate and the HTTP
//! surface into one process. The binary in `src/bin/server.rs` is a thin shell
//! around [`bootstrap`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;

pub use config::{Config, ConfigError};

use axum::Router;
use flashsale_core::StoreError;
use flashsale_core::environment::SystemClock;
use flashsale_postgres::{
    PostgresActivityStore, PostgresError, PostgresOrderRecorder, PostgresProductCatalog,
};
use flashsale_redis::RedisAdmissionGate;
use flashsale_runtime::metrics::{MetricsError, install_recorder};
use flashsale_runtime::{FlashSaleEnvironment, FlashSaleService, SequencedOrderNumbers};
use flashsale_web::{AppState, register_http_metrics, router};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Startup and serving failures.
#[derive(Error, Debug)]
pub enum AppError {
    /// Bad configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Database unreachable or migrations failed
    #[error(transparent)]
    Postgres(#[from] PostgresError),

    /// Redis unreachable
    #[error("Redis unavailable: {0}")]
    Redis(#[from] StoreError),

    /// Prometheus recorder could not be installed
    #[error(transparent)]
    Metrics(#[from] MetricsError),

    /// Listener or server I/O failure
    #[error("Server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Connect every backend and build the router.
///
/// # Errors
///
/// Returns [`AppError`] if a backend is unreachable, migrations fail or the
/// metrics recorder cannot be installed.
pub async fn bootstrap(config: &Config) -> Result<Router, AppError> {
    let metrics = install_recorder()?;
    register_http_metrics();

    tracing::info!("Connecting to PostgreSQL...");
    let pool = flashsale_postgres::connect(
        &config.postgres.url,
        config.postgres.max_connections,
        Duration::from_secs(config.postgres.connect_timeout),
    )
    .await?;
    flashsale_postgres::migrate(&pool).await?;

    tracing::info!("Connecting to Redis...");
    let gate = RedisAdmissionGate::new(&config.redis.url).await?;

    let env = FlashSaleEnvironment {
        activities: Arc::new(PostgresActivityStore::from_pool(pool.clone())),
        orders: Arc::new(PostgresOrderRecorder::from_pool(pool.clone())),
        gate: Arc::new(gate),
        order_numbers: Arc::new(SequencedOrderNumbers::new(config.flash_sale.node_id)),
        catalog: Arc::new(PostgresProductCatalog::from_pool(pool)),
        clock: Arc::new(SystemClock),
        settings: config.settings(),
    };

    tracing::info!(
        node_id = config.flash_sale.node_id,
        persist_timeout_ms = config.flash_sale.persist_timeout_ms,
        "Flash-sale service ready"
    );
    Ok(router(
        AppState::new(FlashSaleService::new(env)).with_metrics(metrics),
    ))
}

/// Bind, serve and block until a shutdown signal arrives.
///
/// # Errors
///
/// Returns [`AppError::Io`] if the address cannot be bound or the server fails.
pub async fn serve(config: &Config, app: Router) -> Result<(), AppError> {
    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Waits for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C, shutting down gracefully..."),
        () = terminate => tracing::info!("Received SIGTERM, shutting down gracefully..."),
    }
}
