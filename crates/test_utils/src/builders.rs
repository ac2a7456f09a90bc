//! Test Data Builders
//!
//! Builders for orders and settlements in any lifecycle state, so tests
//! can seed mocks without walking the workflow.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use core_kernel::{Money, RiderId, SettlementId};
use domain_delivery::{Order, OrderStatus, PaymentMethod};
use domain_payment::{ObligationStatus, SettlementObligation};

use crate::fixtures::{MoneyFixtures, OrderFixtures, TemporalFixtures};

/// Builder for orders
pub struct OrderBuilder {
    order: Order,
}

impl Default for OrderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderBuilder {
    /// A pending, unassigned ₱750 order
    pub fn new() -> Self {
        let order = Order::create(OrderFixtures::new_order(MoneyFixtures::cod_750()))
            .expect("fixture order is valid");
        Self { order }
    }

    pub fn cod(mut self, cod: Money) -> Self {
        self.order.cod_amount = cod;
        self
    }

    pub fn status(mut self, status: OrderStatus) -> Self {
        self.order.status = status;
        self
    }

    pub fn rider(mut self, rider_id: RiderId) -> Self {
        self.order.rider_id = Some(rider_id);
        self
    }

    /// Assigned to `rider_id` and waiting on a QR payment
    pub fn awaiting_qr(self, rider_id: RiderId) -> Self {
        let mut builder = self.rider(rider_id).status(OrderStatus::PaymentPending);
        builder.order.payment_method = Some(PaymentMethod::Qrph);
        builder.order.payment_reference = Some("ORD-1718000000000-AB12".to_string());
        builder
    }

    /// Completed by `rider_id` at `at` with the given method
    pub fn completed(mut self, rider_id: RiderId, method: PaymentMethod, at: DateTime<Utc>) -> Self {
        self.order.rider_id = Some(rider_id);
        self.order.status = OrderStatus::Completed;
        self.order.payment_method = Some(method);
        self.order.amount_paid = self.order.cod_amount;
        self.order.payment_confirmed_at = Some(at);
        self.order.completed_at = Some(at);
        self.order.pod_photo_url = Some("memory://pod/photo.jpg".to_string());
        self
    }

    pub fn amount_paid(mut self, paid: Money) -> Self {
        self.order.amount_paid = paid;
        self
    }

    /// Shifts `updated_at`, which orders the matcher's candidates
    pub fn updated_ago(mut self, minutes: i64) -> Self {
        self.order.updated_at = Utc::now() - Duration::minutes(minutes);
        self
    }

    pub fn build(self) -> Order {
        self.order
    }
}

/// Builder for settlements
pub struct SettlementBuilder {
    settlement: SettlementObligation,
}

impl SettlementBuilder {
    /// A pending settlement for `rider_id` with nothing paid
    pub fn new(rider_id: RiderId, expected: Money) -> Self {
        let now = Utc::now();
        Self {
            settlement: SettlementObligation {
                id: SettlementId::new(),
                rider_id,
                settlement_date: TemporalFixtures::business_date(),
                amount_expected: expected,
                amount_paid: Money::zero(expected.currency()),
                status: ObligationStatus::Pending,
                payment_reference: Some("SET-1718000000000-CD34".to_string()),
                last_webhook_event_id: None,
                initiated_at: now,
                settled_at: None,
                created_at: now,
                updated_at: now,
            },
        }
    }

    pub fn date(mut self, date: NaiveDate) -> Self {
        self.settlement.settlement_date = date;
        self
    }

    pub fn paid(mut self, paid: Money) -> Self {
        self.settlement.amount_paid = paid;
        self
    }

    pub fn confirmed(mut self) -> Self {
        self.settlement.status = ObligationStatus::Confirmed;
        self.settlement.amount_paid = self.settlement.amount_expected;
        self.settlement.settled_at = Some(Utc::now());
        self
    }

    pub fn initiated_ago(mut self, minutes: i64) -> Self {
        self.settlement.initiated_at = Utc::now() - Duration::minutes(minutes);
        self
    }

    pub fn build(self) -> SettlementObligation {
        self.settlement
    }
}
