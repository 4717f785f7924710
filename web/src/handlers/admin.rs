//! Activity administration endpoints.

use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use flashsale_core::{Activity, ActivityId, ActivitySpec};
use serde::Deserialize;

/// Body of `PUT /api/admin/activities/:id/stock`.
#[derive(Debug, Deserialize)]
pub struct StockAdjustment {
    /// New remaining stock
    pub remaining_stock: u32,
}

/// `POST /api/admin/activities`
///
/// # Errors
///
/// `422` for an invalid window or unknown product.
pub async fn create(
    State(state): State<AppState>,
    Json(spec): Json<ActivitySpec>,
) -> Result<(StatusCode, Json<Activity>), ApiError> {
    let activity = state.service.create_activity(spec).await?;
    Ok((StatusCode::CREATED, Json(activity)))
}

/// `GET /api/admin/activities/:id`
///
/// # Errors
///
/// `404 ACTIVITY_NOT_FOUND` for unknown ids.
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<ActivityId>,
) -> Result<Json<Activity>, ApiError> {
    Ok(Json(state.service.get_activity(id).await?))
}

/// `PUT /api/admin/activities/:id`
///
/// # Errors
///
/// `404` for unknown ids, `422` for invalid specs.
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<ActivityId>,
    Json(spec): Json<ActivitySpec>,
) -> Result<Json<Activity>, ApiError> {
    Ok(Json(state.service.update_activity(id, spec).await?))
}

/// `PUT /api/admin/activities/:id/stock`
///
/// # Errors
///
/// `404 ACTIVITY_NOT_FOUND` for unknown ids.
pub async fn adjust_stock(
    State(state): State<AppState>,
    Path(id): Path<ActivityId>,
    Json(adjustment): Json<StockAdjustment>,
) -> Result<Json<Activity>, ApiError> {
    Ok(Json(
        state
            .service
            .adjust_stock(id, adjustment.remaining_stock)
            .await?,
    ))
}

/// `DELETE /api/admin/activities/:id`
///
/// # Errors
///
/// `404 ACTIVITY_NOT_FOUND` for unknown ids.
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<ActivityId>,
) -> Result<StatusCode, ApiError> {
    state.service.delete_activity(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
