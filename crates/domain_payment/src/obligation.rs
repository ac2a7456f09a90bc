//! Obligations: amounts owed that payment events accumulate into
//!
//! Two variants share one accumulator through the [`Obligation`] trait:
//! an order's COD amount while it sits in `payment_pending`, and a rider's
//! daily cash settlement.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use core_kernel::{Money, MoneyError, OrderId, RiderId, SettlementId};
use domain_delivery::{Order, OrderStatus, PaymentMethod};

/// Payment status of an obligation
///
/// `pending -> confirmed` happens at most once and never reverses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObligationStatus {
    Pending,
    Confirmed,
}

impl ObligationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObligationStatus::Pending => "pending",
            ObligationStatus::Confirmed => "confirmed",
        }
    }
}

impl fmt::Display for ObligationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one obligation record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ObligationRef {
    Order(OrderId),
    Settlement(SettlementId),
}

impl fmt::Display for ObligationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObligationRef::Order(id) => write!(f, "{}", id),
            ObligationRef::Settlement(id) => write!(f, "{}", id),
        }
    }
}

/// Common view of anything a payment event can be applied to
pub trait Obligation {
    fn obligation_ref(&self) -> ObligationRef;
    fn amount_expected(&self) -> Money;
    fn amount_paid(&self) -> Money;
    fn status(&self) -> ObligationStatus;
    /// Last event id that mutated this record
    fn last_webhook_event_id(&self) -> Option<&str>;
    /// Most-recent-activity timestamp used for matching
    fn updated_at(&self) -> DateTime<Utc>;

    fn remaining(&self) -> Result<Money, MoneyError> {
        self.amount_expected().remaining_after(&self.amount_paid())
    }

    /// Partly paid but not yet covered
    fn is_insufficient(&self) -> bool {
        let paid = self.amount_paid();
        paid.is_positive()
            && !self
                .amount_expected()
                .is_covered_by(&paid)
                .unwrap_or(true)
    }
}

/// The payment side of an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderObligation {
    pub order_id: OrderId,
    pub order_number: String,
    pub rider_id: Option<RiderId>,
    pub order_status: OrderStatus,
    pub payment_method: Option<PaymentMethod>,
    pub amount_expected: Money,
    pub amount_paid: Money,
    pub payment_error: Option<String>,
    pub payment_reference: Option<String>,
    pub last_webhook_event_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Order> for OrderObligation {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id,
            order_number: order.order_number.clone(),
            rider_id: order.rider_id,
            order_status: order.status,
            payment_method: order.payment_method,
            amount_expected: order.cod_amount,
            amount_paid: order.amount_paid,
            payment_error: order.payment_error.clone(),
            payment_reference: order.payment_reference.clone(),
            last_webhook_event_id: order.last_webhook_event_id.clone(),
            updated_at: order.updated_at,
        }
    }
}

impl Obligation for OrderObligation {
    fn obligation_ref(&self) -> ObligationRef {
        ObligationRef::Order(self.order_id)
    }

    fn amount_expected(&self) -> Money {
        self.amount_expected
    }

    fn amount_paid(&self) -> Money {
        self.amount_paid
    }

    fn status(&self) -> ObligationStatus {
        if self.order_status.is_paid() {
            ObligationStatus::Confirmed
        } else {
            ObligationStatus::Pending
        }
    }

    fn last_webhook_event_id(&self) -> Option<&str> {
        self.last_webhook_event_id.as_deref()
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// A rider's cash remittance for one business day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementObligation {
    pub id: SettlementId,
    pub rider_id: RiderId,
    pub settlement_date: NaiveDate,
    pub amount_expected: Money,
    pub amount_paid: Money,
    pub status: ObligationStatus,
    pub payment_reference: Option<String>,
    pub last_webhook_event_id: Option<String>,
    pub initiated_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Obligation for SettlementObligation {
    fn obligation_ref(&self) -> ObligationRef {
        ObligationRef::Settlement(self.id)
    }

    fn amount_expected(&self) -> Money {
        self.amount_expected
    }

    fn amount_paid(&self) -> Money {
        self.amount_paid
    }

    fn status(&self) -> ObligationStatus {
        self.status
    }

    fn last_webhook_event_id(&self) -> Option<&str> {
        self.last_webhook_event_id.as_deref()
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// The obligation a payment event was matched to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchedObligation {
    Settlement(SettlementObligation),
    Order(OrderObligation),
}

impl MatchedObligation {
    fn inner(&self) -> &dyn Obligation {
        match self {
            MatchedObligation::Settlement(s) => s,
            MatchedObligation::Order(o) => o,
        }
    }

    pub fn rider_id(&self) -> Option<RiderId> {
        match self {
            MatchedObligation::Settlement(s) => Some(s.rider_id),
            MatchedObligation::Order(o) => o.rider_id,
        }
    }
}

impl Obligation for MatchedObligation {
    fn obligation_ref(&self) -> ObligationRef {
        self.inner().obligation_ref()
    }

    fn amount_expected(&self) -> Money {
        self.inner().amount_expected()
    }

    fn amount_paid(&self) -> Money {
        self.inner().amount_paid()
    }

    fn status(&self) -> ObligationStatus {
        self.inner().status()
    }

    fn last_webhook_event_id(&self) -> Option<&str> {
        self.inner().last_webhook_event_id()
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.inner().updated_at()
    }
}
