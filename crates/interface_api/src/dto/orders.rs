//! Order DTOs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use core_kernel::{Money, OrderId, PaymentTransactionId, RiderId};
use domain_delivery::{
    ConfirmationSource, ContactPoint, DailySummary, DeliveryLine, NewOrder, Order, OrderStatus, PaymentMethod,
    PaymentTransaction, ProofUpload,
};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ContactRequest {
    #[validate(length(min = 1, message = "address is required"))]
    pub address: String,
    #[validate(length(min = 1, message = "contact name is required"))]
    pub contact_name: String,
    #[validate(length(min = 5, max = 20))]
    pub contact_phone: String,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,
}

impl From<ContactRequest> for ContactPoint {
    fn from(c: ContactRequest) -> Self {
        ContactPoint {
            address: c.address,
            contact_name: c.contact_name,
            contact_phone: c.contact_phone,
            latitude: c.latitude,
            longitude: c.longitude,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, max = 500))]
    pub package_description: String,
    pub cod_amount: Decimal,
    #[validate(length(min = 1, max = 64))]
    pub barcode: String,
    #[validate(nested)]
    pub pickup: ContactRequest,
    #[validate(nested)]
    pub delivery: ContactRequest,
}

impl From<CreateOrderRequest> for NewOrder {
    fn from(r: CreateOrderRequest) -> Self {
        NewOrder {
            package_description: r.package_description,
            cod_amount: Money::php(r.cod_amount),
            barcode: r.barcode,
            pickup: r.pickup.into(),
            delivery: r.delivery.into(),
        }
    }
}

/// Which slice of orders to list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderView {
    /// Filter by the query parameters only
    #[default]
    All,
    /// Unassigned orders any rider may claim
    Available,
    /// The acting rider's active orders
    Mine,
    /// The acting rider's completed orders
    Completed,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOrdersQuery {
    #[serde(default)]
    pub view: OrderView,
    pub rider_id: Option<RiderId>,
    pub status: Option<OrderStatus>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct PickupRequest {
    pub barcode: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPaymentRequest {
    pub payment_method: PaymentMethod,
    pub cash_audit_note: Option<String>,
    pub payment_reference: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteOrderRequest {
    pub pod_photo_url: String,
    pub pod_latitude: Option<f64>,
    pub pod_longitude: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactResponse {
    pub address: String,
    pub contact_name: String,
    pub contact_phone: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl From<ContactPoint> for ContactResponse {
    fn from(c: ContactPoint) -> Self {
        Self {
            address: c.address,
            contact_name: c.contact_name,
            contact_phone: c.contact_phone,
            latitude: c.latitude,
            longitude: c.longitude,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: OrderId,
    pub order_number: String,
    pub package_description: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub cod_amount: Decimal,
    pub barcode: String,
    pub pickup: ContactResponse,
    pub delivery: ContactResponse,
    pub status: OrderStatus,
    pub payment_method: Option<PaymentMethod>,
    pub rider_id: Option<RiderId>,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount_paid: Decimal,
    pub payment_error: Option<String>,
    pub payment_reference: Option<String>,
    pub cash_audit_note: Option<String>,
    pub pod_photo_url: Option<String>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub payment_confirmed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Order> for OrderResponse {
    fn from(o: Order) -> Self {
        Self {
            id: o.id,
            order_number: o.order_number,
            package_description: o.package_description,
            cod_amount: o.cod_amount.amount(),
            barcode: o.barcode,
            pickup: o.pickup.into(),
            delivery: o.delivery.into(),
            status: o.status,
            payment_method: o.payment_method,
            rider_id: o.rider_id,
            amount_paid: o.amount_paid.amount(),
            payment_error: o.payment_error,
            payment_reference: o.payment_reference,
            cash_audit_note: o.cash_audit_note,
            pod_photo_url: o.pod_photo_url,
            accepted_at: o.accepted_at,
            picked_up_at: o.picked_up_at,
            payment_confirmed_at: o.payment_confirmed_at,
            completed_at: o.completed_at,
            created_at: o.created_at,
            updated_at: o.updated_at,
        }
    }
}

/// One payment ledger entry
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentTransactionResponse {
    pub id: PaymentTransactionId,
    pub order_id: OrderId,
    pub payment_method: PaymentMethod,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub status: &'static str,
    pub source: ConfirmationSource,
    pub provider_reference: Option<String>,
    pub webhook_event_id: Option<String>,
    pub confirmed_at: DateTime<Utc>,
}

impl From<PaymentTransaction> for PaymentTransactionResponse {
    fn from(t: PaymentTransaction) -> Self {
        Self {
            id: t.id,
            order_id: t.order_id,
            payment_method: t.payment_method,
            amount: t.amount.amount(),
            status: "confirmed",
            source: t.source,
            provider_reference: t.provider_reference,
            webhook_event_id: t.webhook_event_id,
            confirmed_at: t.confirmed_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentTransactionListResponse {
    pub transactions: Vec<PaymentTransactionResponse>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub has_more: bool,
}

#[derive(Debug, Serialize)]
pub struct OrderListResponse {
    pub orders: Vec<OrderResponse>,
    pub pagination: Pagination,
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    /// Business day; defaults to today in the configured timezone
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryLineResponse {
    pub order_id: OrderId,
    pub order_number: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub cod_amount: Decimal,
    pub payment_method: Option<PaymentMethod>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<DeliveryLine> for DeliveryLineResponse {
    fn from(l: DeliveryLine) -> Self {
        Self {
            order_id: l.order_id,
            order_number: l.order_number,
            cod_amount: l.cod_amount.amount(),
            payment_method: l.payment_method,
            completed_at: l.completed_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySummaryResponse {
    pub rider_id: RiderId,
    pub date: NaiveDate,
    pub total_deliveries: usize,
    pub qrph_count: usize,
    #[serde(with = "rust_decimal::serde::float")]
    pub qrph_amount: Decimal,
    pub cash_count: usize,
    /// What the rider remits through a settlement
    #[serde(with = "rust_decimal::serde::float")]
    pub cash_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_collected: Decimal,
    pub recent_deliveries: Vec<DeliveryLineResponse>,
}

impl From<DailySummary> for DailySummaryResponse {
    fn from(s: DailySummary) -> Self {
        Self {
            rider_id: s.rider_id,
            date: s.date,
            total_deliveries: s.total_deliveries,
            qrph_count: s.qrph_count,
            qrph_amount: s.qrph_amount.amount(),
            cash_count: s.cash_count,
            cash_amount: s.cash_amount.amount(),
            total_collected: s.total_collected.amount(),
            recent_deliveries: s.recent.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UploadPodRequest {
    pub order_id: OrderId,
    #[validate(length(min = 1, message = "photo data is required"))]
    pub photo_base64: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadPodResponse {
    pub success: bool,
    pub photo_url: Option<String>,
    pub file_name: String,
    pub fallback_to_base64: bool,
    /// Value to submit as `podPhotoUrl` when completing the order
    pub pod_reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl From<ProofUpload> for UploadPodResponse {
    fn from(u: ProofUpload) -> Self {
        let pod_reference = u.reference().map(str::to_string);
        let warning = u
            .fallback_to_inline
            .then(|| "Storage not configured. Photo stored as base64 fallback.".to_string());
        Self {
            success: true,
            photo_url: u.photo_url,
            file_name: u.path,
            fallback_to_base64: u.fallback_to_inline,
            pod_reference,
            warning,
        }
    }
}
