//! Error types for web handlers.
//!
//! [`ApiError`] bridges [`FlashSaleError`] and HTTP responses. Every error kind
//! maps to exactly one status and one stable machine-readable code.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use flashsale_core::FlashSaleError;
use serde::Serialize;
use std::fmt;

/// Application error type for web handlers.
///
/// # Examples
///
/// ```ignore
/// async fn handler(State(state): State<AppState>) -> Result<Json<Activity>, ApiError> {
///     let activity = state.service.get_activity(id).await?;
///     Ok(Json(activity))
/// }
/// ```
#[derive(Debug)]
pub struct ApiError {
    /// HTTP status code
    status: StatusCode,
    /// Error message (user-facing)
    message: String,
    /// Error code (for client error handling)
    code: &'static str,
    /// Milliseconds until the sale opens, for `ACTIVITY_NOT_YET_OPEN`
    wait_millis: Option<i64>,
    /// Internal detail (logged, not exposed to the client)
    detail: Option<String>,
}

impl ApiError {
    /// Create a new application error.
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>, code: &'static str) -> Self {
        Self {
            status,
            message: message.into(),
            code,
            wait_millis: None,
            detail: None,
        }
    }

    /// Create a 400 Bad Request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message, "BAD_REQUEST")
    }

    /// Create a 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            message,
            "INTERNAL_SERVER_ERROR",
        )
    }

    /// HTTP status of this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }
}

impl From<FlashSaleError> for ApiError {
    fn from(err: FlashSaleError) -> Self {
        let (status, code) = match &err {
            FlashSaleError::ActivityNotFound => (StatusCode::NOT_FOUND, "ACTIVITY_NOT_FOUND"),
            FlashSaleError::ActivityNotYetOpen { .. } => {
                (StatusCode::CONFLICT, "ACTIVITY_NOT_YET_OPEN")
            }
            FlashSaleError::ActivityClosed => (StatusCode::CONFLICT, "ACTIVITY_CLOSED"),
            FlashSaleError::OutOfStock => (StatusCode::CONFLICT, "OUT_OF_STOCK"),
            FlashSaleError::AlreadyParticipated => (StatusCode::CONFLICT, "ALREADY_PARTICIPATED"),
            FlashSaleError::PersistenceFailure { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, "PERSISTENCE_FAILURE")
            }
            FlashSaleError::InvalidActivity { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_ACTIVITY")
            }
            FlashSaleError::ProductNotFound => {
                (StatusCode::UNPROCESSABLE_ENTITY, "PRODUCT_NOT_FOUND")
            }
            FlashSaleError::OrderNotFound => (StatusCode::NOT_FOUND, "ORDER_NOT_FOUND"),
            FlashSaleError::OrderNotCancellable => (StatusCode::CONFLICT, "ORDER_NOT_CANCELLABLE"),
            FlashSaleError::ConcurrentUpdate => (StatusCode::CONFLICT, "CONCURRENT_UPDATE"),
        };

        let mut api = Self::new(status, err.to_string(), code);
        match err {
            FlashSaleError::ActivityNotYetOpen { wait_millis } => {
                api.wait_millis = Some(wait_millis);
            }
            FlashSaleError::PersistenceFailure { reason } => api.detail = Some(reason),
            _ => {}
        }
        api
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    /// Error code (for client error handling).
    code: &'static str,
    /// Human-readable error message.
    message: String,
    /// Present only when the sale has not opened yet.
    #[serde(skip_serializing_if = "Option::is_none")]
    wait_millis: Option<i64>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(
                status = %self.status,
                code = self.code,
                message = %self.message,
                detail = self.detail.as_deref().unwrap_or(""),
                "Request failed"
            );
        }

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
            wait_millis: self.wait_millis,
        };

        (self.status, Json(body)).into_response()
    }
}
