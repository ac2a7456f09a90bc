//! Order payment handlers

use axum::{
    extract::{Query, State},
    Json,
};

use crate::auth::Claims;
use crate::dto::payments::*;
use crate::error::ApiError;
use crate::AppState;

/// Opens the QR payment obligation for an order the rider is delivering
pub async fn initiate_payment(
    State(state): State<AppState>,
    claims: Claims,
    Json(request): Json<InitiatePaymentRequest>,
) -> Result<Json<PaymentInitiationResponse>, ApiError> {
    let order = state
        .delivery
        .initiate_qr_payment(request.order_id, claims.rider_id()?)
        .await?;
    Ok(Json(PaymentInitiationResponse::new(
        order,
        state.desk.static_qr_image_url(),
    )))
}

/// Read-only projection polled by the rider app
pub async fn payment_status(
    State(state): State<AppState>,
    _claims: Claims,
    Query(query): Query<PaymentStatusQuery>,
) -> Result<Json<PaymentStatusResponse>, ApiError> {
    let status = state.desk.order_payment_status(query.order_id).await?;
    Ok(Json(status.into()))
}
