//! Payment ledger
//!
//! One `PaymentTransaction` per confirmed order payment, whichever path
//! confirmed it. The entry rides along with the confirming write
//! ([`crate::ConditionalOrderUpdate::record`] for rider confirmations,
//! `domain_payment::PaymentWrite::ledger` for webhooks) so the adapter
//! stores both or neither.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{Money, OrderId, PaymentTransactionId};

use crate::order::{Order, PaymentMethod};

/// Who confirmed the payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationSource {
    /// Rider asserted it at the door
    Rider,
    /// Provider webhook
    Webhook,
}

/// A confirmed payment against an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub id: PaymentTransactionId,
    pub order_id: OrderId,
    pub payment_method: PaymentMethod,
    pub amount: Money,
    pub source: ConfirmationSource,
    /// Provider reference, QR payments only
    pub provider_reference: Option<String>,
    /// Event that confirmed a webhook payment
    pub webhook_event_id: Option<String>,
    pub confirmed_at: DateTime<Utc>,
}

impl PaymentTransaction {
    /// Entry for a rider confirmation; records the full COD amount
    pub fn rider_confirmed(
        order: &Order,
        method: PaymentMethod,
        provider_reference: Option<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: PaymentTransactionId::new_v7(),
            order_id: order.id,
            payment_method: method,
            amount: order.cod_amount,
            source: ConfirmationSource::Rider,
            provider_reference,
            webhook_event_id: None,
            confirmed_at: at,
        }
    }

    /// Entry for a webhook confirmation; records everything paid so far
    pub fn webhook_confirmed(
        order_id: OrderId,
        amount_paid: Money,
        provider_reference: Option<String>,
        event_id: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: PaymentTransactionId::new_v7(),
            order_id,
            payment_method: PaymentMethod::Qrph,
            amount: amount_paid,
            source: ConfirmationSource::Webhook,
            provider_reference,
            webhook_event_id: Some(event_id.into()),
            confirmed_at: at,
        }
    }
}
