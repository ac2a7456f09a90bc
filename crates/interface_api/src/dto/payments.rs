//! Order payment DTOs

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::OrderId;
use domain_delivery::{Order, OrderStatus, PaymentMethod};
use domain_payment::OrderPaymentStatus;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePaymentRequest {
    pub order_id: OrderId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInitiationResponse {
    pub success: bool,
    pub order_id: OrderId,
    pub payment_reference: Option<String>,
    pub static_qr_image_url: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub expected_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount_paid: Decimal,
}

impl PaymentInitiationResponse {
    pub fn new(order: Order, static_qr_image_url: &str) -> Self {
        Self {
            success: true,
            order_id: order.id,
            payment_reference: order.payment_reference,
            static_qr_image_url: static_qr_image_url.to_string(),
            expected_amount: order.cod_amount.amount(),
            amount_paid: order.amount_paid.amount(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusQuery {
    #[serde(alias = "order_id")]
    pub order_id: OrderId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusResponse {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub payment_method: Option<PaymentMethod>,
    #[serde(with = "rust_decimal::serde::float")]
    pub expected_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount_paid: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub remaining_amount: Decimal,
    pub is_payment_complete: bool,
    pub is_insufficient: bool,
    pub payment_error: Option<String>,
    pub payment_reference: Option<String>,
}

impl From<OrderPaymentStatus> for PaymentStatusResponse {
    fn from(s: OrderPaymentStatus) -> Self {
        Self {
            order_id: s.order_id,
            status: s.status,
            payment_method: s.payment_method,
            expected_amount: s.expected_amount.amount(),
            amount_paid: s.amount_paid.amount(),
            remaining_amount: s.remaining_amount.amount(),
            is_payment_complete: s.is_payment_complete,
            is_insufficient: s.is_insufficient,
            payment_error: s.payment_error,
            payment_reference: s.payment_reference,
        }
    }
}
