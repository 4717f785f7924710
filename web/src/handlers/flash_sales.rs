//! Requester-facing flash-sale endpoints.

use crate::error::ApiError;
use crate::extractors::Requester;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
};
use flashsale_core::{ActivityId, ActivitySummary, FlashSaleResult, PaymentMethod};
use serde::Deserialize;

/// Body of `POST /api/flash-sales/:activity_id/orders`.
#[derive(Debug, Deserialize)]
pub struct FlashSaleRequest {
    /// How the requester intends to pay
    pub payment_method: PaymentMethod,
}

/// Attempt to buy one unit.
///
/// Always answers `200 OK`; the outcome is in the envelope.
///
/// # Endpoint
///
/// ```text
/// POST /api/flash-sales/:activity_id/orders
/// X-Requester-Id: <uuid>
/// {"payment_method": "alipay"}
/// ```
///
/// # Response
///
/// ```json
/// {"success": true, "message": "Flash sale order created", "orderNumber": "...", "waitMillis": 0}
/// ```
pub async fn execute(
    State(state): State<AppState>,
    Path(activity_id): Path<ActivityId>,
    Requester(requester): Requester,
    Json(request): Json<FlashSaleRequest>,
) -> Json<FlashSaleResult> {
    Json(
        state
            .service
            .execute_flash_sale(requester, activity_id, request.payment_method)
            .await,
    )
}

/// `GET /api/flash-sales/active`
///
/// # Errors
///
/// Returns an [`ApiError`] if the activity store is unavailable.
pub async fn list_active(
    State(state): State<AppState>,
) -> Result<Json<Vec<ActivitySummary>>, ApiError> {
    Ok(Json(state.service.list_active().await?))
}

/// `GET /api/flash-sales/upcoming`
///
/// # Errors
///
/// Returns an [`ApiError`] if the activity store is unavailable.
pub async fn list_upcoming(
    State(state): State<AppState>,
) -> Result<Json<Vec<ActivitySummary>>, ApiError> {
    Ok(Json(state.service.list_upcoming().await?))
}
