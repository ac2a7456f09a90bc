//! API error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use domain_delivery::DeliveryError;
use domain_payment::{NormalizationError, PaymentError};

use crate::auth::AuthError;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Storage is temporarily unreachable
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", "Unauthorized".to_string()),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone()),
            ApiError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error", msg.clone()),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable", msg.clone()),
            ApiError::Internal(msg) => {
                error!(error = %msg, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "Internal server error".to_string())
            }
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
            details: None,
        };

        (status, Json(body)).into_response()
    }
}

impl From<DeliveryError> for ApiError {
    fn from(err: DeliveryError) -> Self {
        match err {
            DeliveryError::OrderNotFound(_) => ApiError::NotFound(err.to_string()),
            DeliveryError::NotAssigned(_) => ApiError::Forbidden(err.to_string()),
            DeliveryError::NotClaimable { .. }
            | DeliveryError::InvalidTransition { .. }
            | DeliveryError::PaymentAlreadyConfirmed
            | DeliveryError::ConcurrentModification(_) => ApiError::Conflict(err.to_string()),
            DeliveryError::BarcodeMismatch
            | DeliveryError::Validation(_)
            | DeliveryError::InvalidProof(_) => ApiError::Validation(err.to_string()),
            DeliveryError::Money(_) | DeliveryError::Temporal(_) => ApiError::BadRequest(err.to_string()),
            DeliveryError::Store(ref port) if port.is_transient() => ApiError::Unavailable(err.to_string()),
            DeliveryError::Store(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        if err.is_retryable() {
            return ApiError::Unavailable(err.to_string());
        }
        match err {
            PaymentError::Normalization(NormalizationError::InvalidSignature) => ApiError::Unauthorized,
            PaymentError::Normalization(_) | PaymentError::Money(_) => ApiError::BadRequest(err.to_string()),
            PaymentError::ObligationNotFound(_) => ApiError::NotFound(err.to_string()),
            PaymentError::SettlementAlreadyCompleted | PaymentError::ConcurrentUpdate(_) => {
                ApiError::Conflict(err.to_string())
            }
            PaymentError::Validation(_) => ApiError::Validation(err.to_string()),
            PaymentError::Store(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingPermission(_) => ApiError::Forbidden(err.to_string()),
            _ => ApiError::Unauthorized,
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::{OrderId, PortError};
    use domain_delivery::OrderStatus;

    fn status_of(err: impl Into<ApiError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn test_delivery_errors_map_to_status_codes() {
        assert_eq!(status_of(DeliveryError::OrderNotFound(OrderId::new())), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(DeliveryError::NotClaimable { status: OrderStatus::Accepted }),
            StatusCode::CONFLICT
        );
        assert_eq!(status_of(DeliveryError::BarcodeMismatch), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status_of(DeliveryError::NotAssigned(OrderId::new())), StatusCode::FORBIDDEN);
        assert_eq!(
            status_of(DeliveryError::Store(PortError::connection("reset"))),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_payment_errors_map_to_status_codes() {
        assert_eq!(
            status_of(PaymentError::Normalization(NormalizationError::InvalidSignature)),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(status_of(PaymentError::SettlementAlreadyCompleted), StatusCode::CONFLICT);
        assert_eq!(
            status_of(PaymentError::ConcurrentUpdate("x".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
