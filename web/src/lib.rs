//! Axum HTTP surface for the flash-sale core.
//!
//! # Request Flow
//!
//! 1. **HTTP Request** arrives at an Axum handler
//! 2. **Extract** path ids, the `X-Requester-Id` header and the JSON body
//! 3. **Call** the matching [`FlashSaleService`](flashsale_runtime::FlashSaleService) operation
//! 4. **Map** the result (or [`FlashSaleError`](flashsale_core::FlashSaleError)) to a response
//!
//! `ExecuteFlashSale` always answers `200 OK` with the result envelope; every other
//! endpoint reports failures through [`ApiError`].
//!
//! # Example
//!
//! ```ignore
//! use flashsale_web::{AppState, router};
//!
//! let app = router(AppState::new(service).with_metrics(handle));
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod state;

pub use error::ApiError;
pub use extractors::{CorrelationId, REQUESTER_ID_HEADER, Requester};
pub use middleware::{CORRELATION_ID_HEADER, register_http_metrics, request_tracking_layer};
pub use state::AppState;

use axum::{
    Router,
    routing::{get, post, put},
};
use handlers::{admin, flash_sales, health, orders};
use tower_http::trace::TraceLayer;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, ApiError>;

/// Build the full router.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/flash-sales/active", get(flash_sales::list_active))
        .route("/flash-sales/upcoming", get(flash_sales::list_upcoming))
        .route("/flash-sales/:activity_id/orders", post(flash_sales::execute))
        .route("/orders/:order_number", get(orders::get_order))
        .route("/orders/:order_number/cancel", post(orders::cancel_order))
        .route("/admin/activities", post(admin::create))
        .route(
            "/admin/activities/:id",
            get(admin::get).put(admin::update).delete(admin::delete),
        )
        .route("/admin/activities/:id/stock", put(admin::adjust_stock));

    Router::new()
        .nest("/api", api)
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::metrics))
        .layer(TraceLayer::new_for_http())
        .layer(request_tracking_layer())
        .with_state(state)
}
