//! Order handlers
//!
//! Riders act only as the token subject; every mutation goes through the
//! delivery service's conditional writes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use core_kernel::OrderId;
use domain_delivery::{Order, OrderQuery, OrderStatus, PaymentConfirmation, ProofOfDelivery};

use crate::auth::{roles, Claims};
use crate::dto::orders::*;
use crate::error::ApiError;
use crate::AppState;

const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;

/// Statuses a rider still has work to do on
const ACTIVE_STATUSES: [OrderStatus; 6] = [
    OrderStatus::Accepted,
    OrderStatus::PickedUp,
    OrderStatus::Arrived,
    OrderStatus::Delivering,
    OrderStatus::PaymentPending,
    OrderStatus::PaymentConfirmed,
];

/// Creates a new order (admin)
pub async fn create_order(
    State(state): State<AppState>,
    claims: Claims,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    claims.require(roles::ADMIN)?;
    request.validate()?;

    let order = state.delivery.create_order(request.into()).await?;
    Ok((StatusCode::CREATED, Json(order.into())))
}

/// Lists orders, newest first
pub async fn list_orders(
    State(state): State<AppState>,
    claims: Claims,
    Query(params): Query<ListOrdersQuery>,
) -> Result<Json<OrderListResponse>, ApiError> {
    let mut query = match params.view {
        OrderView::Available => OrderQuery::available(),
        OrderView::Mine => OrderQuery::for_rider(claims.rider_id()?).with_statuses(&ACTIVE_STATUSES),
        OrderView::Completed => {
            OrderQuery::for_rider(claims.rider_id()?).with_statuses(&[OrderStatus::Completed])
        }
        OrderView::All => {
            if !claims.is_admin() && params.rider_id != Some(claims.rider_id()?) {
                return Err(ApiError::Forbidden("only admins may list other riders' orders".to_string()));
            }
            OrderQuery {
                rider_id: params.rider_id,
                ..Default::default()
            }
        }
    };
    if let Some(status) = params.status {
        query = query.with_statuses(&[status]);
    }

    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let orders = state.delivery.list_orders(&query.page(page, limit)).await?;

    Ok(Json(OrderListResponse {
        pagination: Pagination {
            page,
            limit,
            has_more: orders.len() == limit as usize,
        },
        orders: orders.into_iter().map(Into::into).collect(),
    }))
}

/// Gets one order; riders see unassigned orders and their own
pub async fn get_order(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state.delivery.get_order(id).await?;
    ensure_visible(&claims, &order)?;
    Ok(Json(order.into()))
}

/// Confirmed payments recorded against an order
pub async fn list_payments(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<OrderId>,
) -> Result<Json<PaymentTransactionListResponse>, ApiError> {
    let order = state.delivery.get_order(id).await?;
    ensure_visible(&claims, &order)?;
    let transactions = state.delivery.payment_transactions(id).await?;
    Ok(Json(PaymentTransactionListResponse {
        transactions: transactions.into_iter().map(Into::into).collect(),
    }))
}

fn ensure_visible(claims: &Claims, order: &Order) -> Result<(), ApiError> {
    if claims.is_admin() {
        return Ok(());
    }
    let visible = match order.rider_id {
        None => true,
        Some(rider) => claims.rider_id()? == rider,
    };
    if visible {
        Ok(())
    } else {
        Err(ApiError::Forbidden("order is assigned to another rider".to_string()))
    }
}

/// Claims an unassigned order for the acting rider
pub async fn claim_order(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state.delivery.claim(id, claims.rider_id()?).await?;
    Ok(Json(order.into()))
}

/// Verifies the scanned package barcode
pub async fn verify_pickup(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<OrderId>,
    Json(request): Json<PickupRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state
        .delivery
        .verify_pickup(id, claims.rider_id()?, &request.barcode)
        .await?;
    Ok(Json(order.into()))
}

pub async fn start_delivery(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state.delivery.start_delivering(id, claims.rider_id()?).await?;
    Ok(Json(order.into()))
}

/// Rider confirms payment without waiting for the provider
pub async fn confirm_payment(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<OrderId>,
    Json(request): Json<ConfirmPaymentRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let confirmation = PaymentConfirmation {
        method: request.payment_method,
        cash_audit_note: request.cash_audit_note,
        payment_reference: request.payment_reference,
    };
    let order = state
        .delivery
        .confirm_payment_direct(id, claims.rider_id()?, confirmation)
        .await?;
    Ok(Json(order.into()))
}

/// Completes a paid order with its proof of delivery
pub async fn complete_order(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<OrderId>,
    Json(request): Json<CompleteOrderRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let proof = ProofOfDelivery {
        photo_url: request.pod_photo_url,
        latitude: request.pod_latitude,
        longitude: request.pod_longitude,
    };
    let order = state.delivery.complete(id, claims.rider_id()?, proof).await?;
    Ok(Json(order.into()))
}

/// Cancels an order (admin)
pub async fn cancel_order(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderResponse>, ApiError> {
    claims.require(roles::ADMIN)?;
    let order = state.delivery.cancel(id).await?;
    Ok(Json(order.into()))
}
