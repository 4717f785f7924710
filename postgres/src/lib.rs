//! `PostgreSQL` durable store for the flash-sale core.
//!
//! Implements the durable half of the allocation path:
//!
//! - [`PostgresActivityStore`]: activity rows and the durable stock counter
//! - [`PostgresOrderRecorder`]: order rows, each write paired with a counter move
//! - [`PostgresProductCatalog`]: read-only product lookups
//!
//! The schema lives in `migrations/` and is applied with [`migrate`].
//!
//! # Example
//!
//! ```no_run
//! use flashsale_postgres::{PostgresActivityStore, connect, migrate};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = connect("postgres://localhost/flashsale", 20, Duration::from_secs(3)).await?;
//! migrate(&pool).await?;
//! let activities = PostgresActivityStore::from_pool(pool);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod activities;
mod catalog;
mod orders;
mod rows;

pub use activities::PostgresActivityStore;
pub use catalog::PostgresProductCatalog;
pub use orders::PostgresOrderRecorder;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use thiserror::Error;

/// Failures while bringing the database up.
#[derive(Error, Debug)]
pub enum PostgresError {
    /// Could not open the pool
    #[error("Failed to connect to PostgreSQL: {0}")]
    Connect(#[source] sqlx::Error),

    /// Schema migration failed
    #[error("Failed to run migrations: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Open a connection pool.
///
/// # Errors
///
/// Returns [`PostgresError::Connect`] if the database is unreachable.
pub async fn connect(
    url: &str,
    max_connections: u32,
    acquire_timeout: Duration,
) -> Result<PgPool, PostgresError> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
        .connect(url)
        .await
        .map_err(PostgresError::Connect)?;

    tracing::info!(max_connections, "Connected to PostgreSQL");
    Ok(pool)
}

/// Apply the bundled schema migrations.
///
/// # Errors
///
/// Returns [`PostgresError::Migrate`] if a migration fails.
pub async fn migrate(pool: &PgPool) -> Result<(), PostgresError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Database migrations applied");
    Ok(())
}
