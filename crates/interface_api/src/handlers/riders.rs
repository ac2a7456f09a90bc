//! Rider handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};

use core_kernel::RiderId;

use crate::auth::Claims;
use crate::dto::orders::{DailySummaryResponse, SummaryQuery};
use crate::error::ApiError;
use crate::handlers::today;
use crate::AppState;

/// What the rider collected on a business day
pub async fn daily_summary(
    State(state): State<AppState>,
    claims: Claims,
    Path(rider_id): Path<RiderId>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<DailySummaryResponse>, ApiError> {
    if !claims.is_admin() && claims.rider_id()? != rider_id {
        return Err(ApiError::Forbidden("riders may only view their own summary".to_string()));
    }
    let date = query.date.unwrap_or_else(|| today(&state));

    let summary = state
        .delivery
        .daily_summary(rider_id, date, &state.config.timezone)
        .await?;
    Ok(Json(summary.into()))
}
