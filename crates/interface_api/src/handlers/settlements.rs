//! Rider settlement handlers

use axum::{
    extract::{Query, State},
    Json,
};

use core_kernel::{Money, RiderId};
use domain_payment::SettlementLookup;

use crate::auth::Claims;
use crate::dto::settlements::*;
use crate::error::ApiError;
use crate::handlers::today;
use crate::AppState;

/// Riders act for themselves; admins for anyone
fn acting_for(claims: &Claims, rider_id: Option<RiderId>) -> Result<RiderId, ApiError> {
    match rider_id {
        Some(rider) if claims.is_admin() => Ok(rider),
        Some(rider) if claims.rider_id()? == rider => Ok(rider),
        Some(_) => Err(ApiError::Forbidden("riders may only settle their own collections".to_string())),
        None => Ok(claims.rider_id()?),
    }
}

/// Opens the rider's settlement for a business day
pub async fn initiate_settlement(
    State(state): State<AppState>,
    claims: Claims,
    Json(request): Json<InitiateSettlementRequest>,
) -> Result<Json<SettlementInitiationResponse>, ApiError> {
    let rider_id = acting_for(&claims, request.rider_id)?;
    let date = request.settlement_date.unwrap_or_else(|| today(&state));

    let initiation = state
        .desk
        .initiate_settlement(rider_id, date, Money::php(request.amount))
        .await?;
    Ok(Json(initiation.into()))
}

/// Looks a settlement up by id, or by rider and date
pub async fn settlement_status(
    State(state): State<AppState>,
    claims: Claims,
    Query(query): Query<SettlementStatusQuery>,
) -> Result<Json<SettlementStatusResponse>, ApiError> {
    let lookup = match query.settlement_id {
        Some(id) => SettlementLookup::ById(id),
        None => SettlementLookup::ByRiderDate(
            acting_for(&claims, query.rider_id)?,
            query.date.unwrap_or_else(|| today(&state)),
        ),
    };

    let status = state.desk.settlement_status(lookup).await?;
    if !claims.is_admin() && claims.rider_id()? != status.rider_id {
        return Err(ApiError::Forbidden("settlement belongs to another rider".to_string()));
    }
    Ok(Json(status.into()))
}
