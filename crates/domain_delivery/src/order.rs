//! Order aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{Currency, Money, OrderId, RiderId};
use crate::error::DeliveryError;

/// Order status
///
/// `Arrived` exists for compatibility with stored rows; the workflow never
/// writes it and treats it like `PickedUp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created, waiting for a rider
    Pending,
    /// Claimed by a rider
    Accepted,
    /// Package scanned at pickup
    PickedUp,
    Arrived,
    /// En route to the customer
    Delivering,
    /// QR payment initiated, waiting on the provider webhook
    PaymentPending,
    /// Paid by cash or confirmed QR transfer
    PaymentConfirmed,
    /// Proof of delivery captured
    Completed,
    /// Cancelled by an admin
    Failed,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 9] = [
        OrderStatus::Pending,
        OrderStatus::Accepted,
        OrderStatus::PickedUp,
        OrderStatus::Arrived,
        OrderStatus::Delivering,
        OrderStatus::PaymentPending,
        OrderStatus::PaymentConfirmed,
        OrderStatus::Completed,
        OrderStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Accepted => "accepted",
            OrderStatus::PickedUp => "picked_up",
            OrderStatus::Arrived => "arrived",
            OrderStatus::Delivering => "delivering",
            OrderStatus::PaymentPending => "payment_pending",
            OrderStatus::PaymentConfirmed => "payment_confirmed",
            OrderStatus::Completed => "completed",
            OrderStatus::Failed => "failed",
        }
    }

    /// Completed and failed orders never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Failed)
    }

    /// True once payment has been collected for the order
    pub fn is_paid(&self) -> bool {
        matches!(self, OrderStatus::PaymentConfirmed | OrderStatus::Completed)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = DeliveryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DeliveryError::validation(format!("unknown order status '{}'", s)))
    }
}

/// How the customer paid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Qrph,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Qrph => "qrph",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = DeliveryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash" => Ok(PaymentMethod::Cash),
            "qrph" => Ok(PaymentMethod::Qrph),
            other => Err(DeliveryError::validation(format!("unknown payment method '{}'", other))),
        }
    }
}

/// A pickup or drop-off location with its contact person
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactPoint {
    pub address: String,
    pub contact_name: String,
    pub contact_phone: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// A cash-on-delivery order
///
/// The order row doubles as the payment obligation for its COD amount:
/// `amount_paid`, `payment_error` and `last_webhook_event_id` are written by
/// the webhook path, everything else by the rider workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Human readable order number, e.g. `ORD-1718000000000`
    pub order_number: String,
    pub package_description: String,
    pub cod_amount: Money,
    /// Barcode printed on the package
    pub barcode: String,
    pub pickup: ContactPoint,
    pub delivery: ContactPoint,
    pub status: OrderStatus,
    pub payment_method: Option<PaymentMethod>,
    pub rider_id: Option<RiderId>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub arrived_at: Option<DateTime<Utc>>,
    pub payment_confirmed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub pod_photo_url: Option<String>,
    pub pod_latitude: Option<f64>,
    pub pod_longitude: Option<f64>,
    pub cash_audit_note: Option<String>,
    pub amount_paid: Money,
    pub payment_error: Option<String>,
    pub payment_reference: Option<String>,
    pub last_webhook_event_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    pub package_description: String,
    pub cod_amount: Money,
    pub barcode: String,
    pub pickup: ContactPoint,
    pub delivery: ContactPoint,
}

impl Order {
    /// Creates a new unassigned order
    pub fn create(new: NewOrder) -> Result<Self, DeliveryError> {
        if new.cod_amount.is_negative() {
            return Err(DeliveryError::validation("COD amount cannot be negative"));
        }
        if new.barcode.trim().is_empty() {
            return Err(DeliveryError::validation("barcode is required"));
        }

        let now = Utc::now();
        let currency = new.cod_amount.currency();
        Ok(Self {
            id: OrderId::new_v7(),
            order_number: generate_order_number(),
            package_description: new.package_description,
            cod_amount: new.cod_amount,
            barcode: new.barcode.trim().to_string(),
            pickup: new.pickup,
            delivery: new.delivery,
            status: OrderStatus::Pending,
            payment_method: None,
            rider_id: None,
            accepted_at: None,
            picked_up_at: None,
            arrived_at: None,
            payment_confirmed_at: None,
            completed_at: None,
            pod_photo_url: None,
            pod_latitude: None,
            pod_longitude: None,
            cash_audit_note: None,
            amount_paid: Money::zero(currency),
            payment_error: None,
            payment_reference: None,
            last_webhook_event_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Compares a scanned barcode against the one on file, ignoring case and
    /// surrounding whitespace
    pub fn barcode_matches(&self, scanned: &str) -> bool {
        self.barcode.trim().to_uppercase() == scanned.trim().to_uppercase()
    }

    pub fn is_assigned_to(&self, rider_id: RiderId) -> bool {
        self.rider_id == Some(rider_id)
    }

    pub fn currency(&self) -> Currency {
        self.cod_amount.currency()
    }
}

/// Generates an order number
pub fn generate_order_number() -> String {
    format!("ORD-{}", Utc::now().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn new_order() -> NewOrder {
        let point = ContactPoint {
            address: "12 Mabini St".to_string(),
            contact_name: "Ana".to_string(),
            contact_phone: "09170000000".to_string(),
            latitude: None,
            longitude: None,
        };
        NewOrder {
            package_description: "Shoes".to_string(),
            cod_amount: Money::php(dec!(750)),
            barcode: " PKG-001 ".to_string(),
            pickup: point.clone(),
            delivery: point,
        }
    }

    #[test]
    fn test_create_order_starts_unassigned() {
        let order = Order::create(new_order()).unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.rider_id.is_none());
        assert!(order.amount_paid.is_zero());
        assert_eq!(order.barcode, "PKG-001");
        assert!(order.order_number.starts_with("ORD-"));
    }

    #[test]
    fn test_create_rejects_negative_cod() {
        let mut new = new_order();
        new.cod_amount = Money::php(dec!(-1));
        assert!(matches!(Order::create(new), Err(DeliveryError::Validation(_))));
    }

    #[test]
    fn test_barcode_match_is_case_insensitive() {
        let order = Order::create(new_order()).unwrap();
        assert!(order.barcode_matches("pkg-001"));
        assert!(order.barcode_matches("  PKG-001\n"));
        assert!(!order.barcode_matches("PKG-002"));
    }

    #[test]
    fn test_status_string_round_trip() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("shipped".parse::<OrderStatus>().is_err());
    }
}
