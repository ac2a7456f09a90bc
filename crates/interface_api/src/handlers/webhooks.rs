//! Payment provider webhook handlers
//!
//! The POST response contract is what the provider's retry logic keys on:
//! 200 for anything already handled or not worth redelivering, 401 for a bad
//! signature, 400 for a malformed payload, 500 with `retryable: true` when
//! redelivering the same event may succeed.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{error, warn};

use core_kernel::Money;
use domain_payment::{NormalizationError, PaymentError, SIGNATURE_HEADERS};

use crate::dto::webhooks::*;
use crate::error::ApiError;
use crate::AppState;

/// First signature header present, in provider preference order
fn signature_header(headers: &HeaderMap) -> Option<&str> {
    SIGNATURE_HEADERS
        .iter()
        .find_map(|name| headers.get(*name))
        .and_then(|value| value.to_str().ok())
}

/// Receives a payment event
pub async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match state.reconciler.handle(&body, signature_header(&headers)).await {
        Ok(reconciliation) => Json(WebhookResponse::from(reconciliation)).into_response(),
        Err(e) => webhook_error(e),
    }
}

fn webhook_error(err: PaymentError) -> Response {
    match err {
        PaymentError::Normalization(NormalizationError::InvalidSignature) => {
            warn!("webhook rejected: invalid signature");
            (
                StatusCode::UNAUTHORIZED,
                Json(WebhookError { error: "Invalid signature".to_string() }),
            )
                .into_response()
        }
        PaymentError::Normalization(e) => {
            warn!(error = %e, "webhook rejected: malformed payload");
            (StatusCode::BAD_REQUEST, Json(WebhookError { error: e.to_string() })).into_response()
        }
        PaymentError::Money(e) => {
            warn!(error = %e, "webhook rejected: amount not applicable");
            (StatusCode::BAD_REQUEST, Json(WebhookError { error: e.to_string() })).into_response()
        }
        // Every 500 is redelivered by the provider; replays are deduplicated
        other => {
            error!(error = %other, transient = other.is_retryable(), "webhook processing failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(RetryableError {
                    error: other.to_string(),
                    retryable: true,
                }),
            )
                .into_response()
        }
    }
}

/// Reports the endpoint as active with its capabilities
pub async fn webhook_status(State(state): State<AppState>) -> Json<WebhookStatusResponse> {
    Json(WebhookStatusResponse {
        status: "active",
        features: WebhookFeatures {
            signature_verification: state.reconciler.signature_verification_enabled(),
            idempotency: true,
            retry_logic: true,
        },
        timestamp: Utc::now(),
    })
}

/// Applies a synthetic payment to one order. Mounted only when
/// `expose_test_webhook` is set.
pub async fn test_webhook(
    State(state): State<AppState>,
    Json(request): Json<TestWebhookRequest>,
) -> Result<Json<WebhookResponse>, ApiError> {
    if request.amount <= Decimal::ZERO {
        return Err(ApiError::BadRequest("amount must be positive".to_string()));
    }
    let reconciliation = state
        .reconciler
        .apply_to_order(request.order_id, Money::php(request.amount))
        .await?;
    Ok(Json(WebhookResponse::from(reconciliation)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_signature_header_preference() {
        let mut headers = HeaderMap::new();
        headers.insert("x-webhook-signature", HeaderValue::from_static("third"));
        headers.insert("x-payrex-signature", HeaderValue::from_static("second"));
        assert_eq!(signature_header(&headers), Some("second"));

        headers.insert("payrex-signature", HeaderValue::from_static("first"));
        assert_eq!(signature_header(&headers), Some("first"));
    }

    #[test]
    fn test_missing_signature_header() {
        assert_eq!(signature_header(&HeaderMap::new()), None);
    }

    #[test]
    fn test_transient_failure_is_retryable_500() {
        let response = webhook_error(PaymentError::Store(core_kernel::PortError::connection("reset")));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = webhook_error(PaymentError::Normalization(NormalizationError::MissingAmount));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_non_transient_failure_still_advertises_retry() {
        let response = webhook_error(PaymentError::Store(core_kernel::PortError::internal("constraint")));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["retryable"], true);
    }
}
