//! Pre-built Test Fixtures
//!
//! Consistent, predictable data for unit and integration tests.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use core_kernel::{Money, Timezone};
use domain_delivery::{ContactPoint, NewOrder};
use domain_payment::event::sign;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

/// Fixture for Money test data
pub struct MoneyFixtures;

impl MoneyFixtures {
    /// The standard COD amount used across scenarios
    pub fn cod_750() -> Money {
        Money::php(dec!(750))
    }

    pub fn php(amount: i64) -> Money {
        Money::php(amount.into())
    }

    pub fn php_zero() -> Money {
        Money::php(dec!(0))
    }
}

/// Fixture for temporal test data
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// A business day in Manila
    pub fn business_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 14).unwrap()
    }

    /// 10:00 Manila time on [`Self::business_date`]
    pub fn mid_morning() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 14, 2, 0, 0).unwrap()
    }

    pub fn manila() -> Timezone {
        Timezone::default()
    }
}

/// Fixture for order inputs
pub struct OrderFixtures;

impl OrderFixtures {
    pub const BARCODE: &'static str = "PKG-0001";

    pub fn pickup() -> ContactPoint {
        ContactPoint {
            address: "Warehouse 3, Pasig City".to_string(),
            contact_name: "Dispatch Desk".to_string(),
            contact_phone: "+639171234567".to_string(),
            latitude: Some(14.5764),
            longitude: Some(121.0851),
        }
    }

    pub fn dropoff() -> ContactPoint {
        ContactPoint {
            address: "88 Mabini St, Makati".to_string(),
            contact_name: "Maria Santos".to_string(),
            contact_phone: "+639189876543".to_string(),
            latitude: None,
            longitude: None,
        }
    }

    pub fn new_order(cod: Money) -> NewOrder {
        NewOrder {
            package_description: "Mobile phone".to_string(),
            cod_amount: cod,
            barcode: Self::BARCODE.to_string(),
            pickup: Self::pickup(),
            delivery: Self::dropoff(),
        }
    }
}

/// Fixture for provider webhook payloads
pub struct WebhookFixtures;

impl WebhookFixtures {
    pub const SECRET: &'static str = "whsec_test_secret";

    /// Provider-shaped payload with the amount in minor units
    pub fn payload(event_id: &str, minor: i64) -> Value {
        json!({
            "id": event_id,
            "type": "payment_intent.succeeded",
            "data": {
                "attributes": {
                    "amount": minor,
                    "currency": "PHP",
                    "status": "succeeded"
                }
            }
        })
    }

    pub fn body(event_id: &str, minor: i64) -> Vec<u8> {
        Self::payload(event_id, minor).to_string().into_bytes()
    }

    /// Signature header value for `body` under [`Self::SECRET`]
    pub fn signature(body: &[u8]) -> String {
        sign(Self::SECRET, body)
    }
}
