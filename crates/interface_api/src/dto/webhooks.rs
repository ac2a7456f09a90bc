//! Payment webhook DTOs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{OrderId, RiderId, SettlementId};
use domain_payment::accumulator::shortfall_message;
use domain_payment::{ApplyOutcome, ApplyResult, ObligationRef, ReconcileOutcome, Reconciliation};

/// Body of every 200 response to the provider
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    pub received: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<&'static str>,
    pub event_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<OrderId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settlement_id: Option<SettlementId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rider_id: Option<RiderId>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub amount_paid: Option<Decimal>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub expected_amount: Option<Decimal>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub remaining_amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    pub processing_time_ms: u64,
}

impl From<Reconciliation> for WebhookResponse {
    fn from(rec: Reconciliation) -> Self {
        let base = WebhookResponse {
            received: true,
            status: None,
            event_id: rec.event.event_id,
            order_id: None,
            settlement_id: None,
            rider_id: None,
            amount_paid: None,
            expected_amount: None,
            remaining_amount: None,
            payment_error: None,
            message: None,
            warning: None,
            processing_time_ms: rec.processing_time_ms,
        };

        match rec.outcome {
            ReconcileOutcome::Unattributed => WebhookResponse {
                warning: Some("No pending order or settlement found".to_string()),
                ..base
            },
            ReconcileOutcome::Applied(result) => applied(base, &result),
        }
    }
}

fn applied(base: WebhookResponse, result: &ApplyResult) -> WebhookResponse {
    let (order_id, settlement_id) = match result.obligation {
        ObligationRef::Order(id) => (Some(id), None),
        ObligationRef::Settlement(id) => (None, Some(id)),
    };
    let insufficient = result.outcome == ApplyOutcome::Insufficient;

    WebhookResponse {
        status: Some(result.status_label()),
        order_id,
        settlement_id,
        rider_id: settlement_id.and(result.rider_id),
        amount_paid: Some(result.amount_paid.amount()),
        expected_amount: Some(result.amount_expected.amount()),
        remaining_amount: insufficient.then(|| result.remaining.amount()),
        payment_error: insufficient.then(|| shortfall_message(&result.amount_paid, &result.remaining)),
        message: (result.outcome == ApplyOutcome::Duplicate).then(|| "Event already processed".to_string()),
        ..base
    }
}

/// Body of a 500 response; the provider redelivers the same event, so
/// `retryable` is always true
#[derive(Debug, Serialize)]
pub struct RetryableError {
    pub error: String,
    pub retryable: bool,
}

#[derive(Debug, Serialize)]
pub struct WebhookError {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct WebhookFeatures {
    pub signature_verification: bool,
    pub idempotency: bool,
    pub retry_logic: bool,
}

#[derive(Debug, Serialize)]
pub struct WebhookStatusResponse {
    pub status: &'static str,
    pub features: WebhookFeatures,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestWebhookRequest {
    #[serde(alias = "order_id")]
    pub order_id: OrderId,
    /// Major units
    pub amount: Decimal,
}
