//! Order lookup and cancellation.

use crate::error::ApiError;
use crate::extractors::Requester;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
};
use flashsale_core::{FlashSaleOrder, OrderNumber};

/// `GET /api/orders/:order_number`
///
/// # Errors
///
/// `404 ORDER_NOT_FOUND` for unknown numbers.
pub async fn get_order(
    State(state): State<AppState>,
    Path(number): Path<String>,
) -> Result<Json<FlashSaleOrder>, ApiError> {
    let order = state.service.get_order(&OrderNumber::new(number)).await?;
    Ok(Json(order))
}

/// `POST /api/orders/:order_number/cancel`
///
/// Cancels a pending order owned by the caller and frees the unit.
///
/// # Errors
///
/// - `404 ORDER_NOT_FOUND` if the order is unknown or belongs to someone else
/// - `409 ORDER_NOT_CANCELLABLE` if it is no longer pending
pub async fn cancel_order(
    State(state): State<AppState>,
    Path(number): Path<String>,
    Requester(requester): Requester,
) -> Result<Json<FlashSaleOrder>, ApiError> {
    let order = state
        .service
        .cancel_order(requester, &OrderNumber::new(number))
        .await?;
    Ok(Json(order))
}
