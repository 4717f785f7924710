//! Flash-sale server.
//!
//! # Usage
//!
//! ```bash
//! # Start infrastructure
//! docker run -d -p 5432:5432 -e POSTGRES_PASSWORD=postgres postgres:16
//! docker run -d -p 6379:6379 redis:7
//!
//! # Run server
//! cargo run --bin flashsale-server
//! ```

use flashsale_server::{AppError, Config, bootstrap, config::DEFAULT_LOG_FILTER, serve};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load .env file
    let _ = dotenvy::dotenv();

    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_new(&config.server.log_level)
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        address = %config.bind_address(),
        redis = %config.redis.url,
        node_id = config.flash_sale.node_id,
        "Starting flash-sale server"
    );

    let app = bootstrap(&config).await?;
    serve(&config, app).await
}
