//! Proof-of-delivery upload handler

use axum::{extract::State, Json};
use validator::Validate;

use crate::auth::Claims;
use crate::dto::orders::{UploadPodRequest, UploadPodResponse};
use crate::error::ApiError;
use crate::AppState;

/// Stores a proof photo for an order assigned to the acting rider
pub async fn upload_pod(
    State(state): State<AppState>,
    claims: Claims,
    Json(request): Json<UploadPodRequest>,
) -> Result<Json<UploadPodResponse>, ApiError> {
    request.validate()?;

    let order = state.delivery.get_order(request.order_id).await?;
    if !claims.is_admin() && !order.is_assigned_to(claims.rider_id()?) {
        return Err(ApiError::Forbidden("order is not assigned to this rider".to_string()));
    }

    let upload = state
        .uploader
        .upload(request.order_id, &request.photo_base64)
        .await?;
    Ok(Json(upload.into()))
}
