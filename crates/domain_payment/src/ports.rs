//! Payment Domain Ports
//!
//! `ObligationStore` reads and writes the two obligation kinds. Orders live
//! in the same table the delivery workflow uses; settlements have their own.
//!
//! - **PostgreSQL**: `infra_db::PostgresObligationStore`
//! - **Mock**: [`mock::MockObligationStore`], sharing its order table with
//!   `domain_delivery`'s `MockOrderStore`
//!
//! [`ObligationStore::record_payment`] is the only write the accumulator
//! makes. It applies iff the obligation is still pending and its
//! `amount_paid` and `last_webhook_event_id` still equal what the caller
//! read. A confirming order write carries a `PaymentTransaction` that is
//! stored with it, or not at all.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use core_kernel::{DomainPort, HealthCheckable, Money, OrderId, PortError, RiderId, SettlementId, WriteOutcome};

use domain_delivery::PaymentTransaction;

use crate::obligation::{MatchedObligation, ObligationRef, OrderObligation, SettlementObligation};

/// One accumulation step, written atomically
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentWrite {
    pub target: ObligationRef,
    /// `amount_paid` as read; part of the precondition
    pub expected_amount_paid: Money,
    /// `last_webhook_event_id` as read; part of the precondition
    pub expected_last_event_id: Option<String>,
    pub amount_paid: Money,
    /// Flip the obligation to confirmed (and clear any payment error)
    pub confirm: bool,
    /// Shortfall message for insufficient payments
    pub payment_error: Option<String>,
    pub event_id: String,
    pub at: DateTime<Utc>,
    /// Ledger entry for a confirming order write
    pub ledger: Option<PaymentTransaction>,
}

/// Opens (or reopens) a rider's settlement for a day
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementInit {
    pub rider_id: RiderId,
    pub settlement_date: NaiveDate,
    pub amount: Money,
    pub payment_reference: String,
    pub at: DateTime<Utc>,
}

/// Port for obligation persistence
#[async_trait]
pub trait ObligationStore: DomainPort + HealthCheckable {
    /// Most recently initiated pending settlement
    async fn latest_pending_settlement(&self) -> Result<Option<SettlementObligation>, PortError>;

    /// Most recently updated order in `payment_pending`
    async fn latest_pending_order(&self) -> Result<Option<OrderObligation>, PortError>;

    async fn order_obligation(&self, order_id: OrderId) -> Result<OrderObligation, PortError>;

    async fn get_settlement(&self, id: SettlementId) -> Result<SettlementObligation, PortError>;

    async fn find_settlement(
        &self,
        rider_id: RiderId,
        date: NaiveDate,
    ) -> Result<Option<SettlementObligation>, PortError>;

    /// Obligation whose last applied event is `event_id`, settlements first
    async fn find_by_event_id(&self, event_id: &str) -> Result<Option<MatchedObligation>, PortError>;

    /// Upserts the (rider, date) settlement as pending with nothing paid,
    /// unless it is already confirmed
    async fn open_settlement(
        &self,
        init: SettlementInit,
    ) -> Result<WriteOutcome<SettlementObligation>, PortError>;

    /// Conditional accumulation write, see module docs
    async fn record_payment(&self, write: PaymentWrite) -> Result<WriteOutcome<()>, PortError>;
}

#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    use core_kernel::HealthCheckResult;
    use domain_delivery::ports::mock::{FaultInjector, MockOrderStore, SharedLedger, SharedOrders};
    use domain_delivery::{Order, OrderStatus};

    use crate::obligation::ObligationStatus;

    /// In-memory mock implementation of ObligationStore
    #[derive(Debug, Clone, Default)]
    pub struct MockObligationStore {
        orders: SharedOrders,
        ledger: SharedLedger,
        settlements: Arc<RwLock<HashMap<SettlementId, SettlementObligation>>>,
        faults: FaultInjector,
    }

    impl MockObligationStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Shares the order table and fault injector of `orders`
        pub fn with_order_store(orders: &MockOrderStore) -> Self {
            Self {
                orders: orders.shared(),
                ledger: orders.shared_ledger(),
                settlements: Arc::default(),
                faults: orders.faults(),
            }
        }

        pub async fn insert_settlement(&self, settlement: SettlementObligation) {
            self.settlements.write().await.insert(settlement.id, settlement);
        }

        pub async fn insert_order(&self, order: Order) {
            self.orders.write().await.insert(order.id, order);
        }

        pub fn fail_next(&self, n: u32) {
            self.faults.fail_next(n);
        }
    }

    impl DomainPort for MockObligationStore {}

    #[async_trait]
    impl HealthCheckable for MockObligationStore {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult::healthy("mock-obligation-store")
        }
    }

    #[async_trait]
    impl ObligationStore for MockObligationStore {
        async fn latest_pending_settlement(&self) -> Result<Option<SettlementObligation>, PortError> {
            self.faults.check("latest_pending_settlement")?;
            let settlements = self.settlements.read().await;
            Ok(settlements
                .values()
                .filter(|s| s.status == ObligationStatus::Pending)
                .max_by_key(|s| s.initiated_at)
                .cloned())
        }

        async fn latest_pending_order(&self) -> Result<Option<OrderObligation>, PortError> {
            self.faults.check("latest_pending_order")?;
            let orders = self.orders.read().await;
            Ok(orders
                .values()
                .filter(|o| o.status == OrderStatus::PaymentPending)
                .max_by_key(|o| o.updated_at)
                .map(OrderObligation::from))
        }

        async fn order_obligation(&self, order_id: OrderId) -> Result<OrderObligation, PortError> {
            self.faults.check("order_obligation")?;
            self.orders
                .read()
                .await
                .get(&order_id)
                .map(OrderObligation::from)
                .ok_or_else(|| PortError::not_found("Order", order_id))
        }

        async fn get_settlement(&self, id: SettlementId) -> Result<SettlementObligation, PortError> {
            self.faults.check("get_settlement")?;
            self.settlements
                .read()
                .await
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Settlement", id))
        }

        async fn find_settlement(
            &self,
            rider_id: RiderId,
            date: NaiveDate,
        ) -> Result<Option<SettlementObligation>, PortError> {
            self.faults.check("find_settlement")?;
            Ok(self
                .settlements
                .read()
                .await
                .values()
                .find(|s| s.rider_id == rider_id && s.settlement_date == date)
                .cloned())
        }

        async fn find_by_event_id(&self, event_id: &str) -> Result<Option<MatchedObligation>, PortError> {
            self.faults.check("find_by_event_id")?;
            let applied = |last: &Option<String>| last.as_deref() == Some(event_id);
            if let Some(s) = self
                .settlements
                .read()
                .await
                .values()
                .find(|s| applied(&s.last_webhook_event_id))
            {
                return Ok(Some(MatchedObligation::Settlement(s.clone())));
            }
            Ok(self
                .orders
                .read()
                .await
                .values()
                .find(|o| applied(&o.last_webhook_event_id))
                .map(|o| MatchedObligation::Order(OrderObligation::from(o))))
        }

        async fn open_settlement(
            &self,
            init: SettlementInit,
        ) -> Result<WriteOutcome<SettlementObligation>, PortError> {
            self.faults.check("open_settlement")?;
            let mut settlements = self.settlements.write().await;
            let existing = settlements
                .values()
                .find(|s| s.rider_id == init.rider_id && s.settlement_date == init.settlement_date)
                .map(|s| (s.id, s.status));

            let settlement = match existing {
                Some((_, ObligationStatus::Confirmed)) => return Ok(WriteOutcome::PreconditionFailed),
                Some((id, _)) => {
                    let s = settlements
                        .get_mut(&id)
                        .ok_or_else(|| PortError::not_found("Settlement", id))?;
                    s.amount_expected = init.amount;
                    s.amount_paid = Money::zero(init.amount.currency());
                    s.status = ObligationStatus::Pending;
                    s.payment_reference = Some(init.payment_reference);
                    s.initiated_at = init.at;
                    s.updated_at = init.at;
                    s.clone()
                }
                None => {
                    let s = SettlementObligation {
                        id: SettlementId::new_v7(),
                        rider_id: init.rider_id,
                        settlement_date: init.settlement_date,
                        amount_expected: init.amount,
                        amount_paid: Money::zero(init.amount.currency()),
                        status: ObligationStatus::Pending,
                        payment_reference: Some(init.payment_reference),
                        last_webhook_event_id: None,
                        initiated_at: init.at,
                        settled_at: None,
                        created_at: init.at,
                        updated_at: init.at,
                    };
                    settlements.insert(s.id, s.clone());
                    s
                }
            };
            Ok(WriteOutcome::Applied(settlement))
        }

        async fn record_payment(&self, write: PaymentWrite) -> Result<WriteOutcome<()>, PortError> {
            self.faults.check("record_payment")?;
            match write.target {
                ObligationRef::Order(order_id) => {
                    let mut orders = self.orders.write().await;
                    let order = match orders.get_mut(&order_id) {
                        Some(order) => order,
                        None => return Ok(WriteOutcome::PreconditionFailed),
                    };
                    if order.status != OrderStatus::PaymentPending
                        || order.amount_paid != write.expected_amount_paid
                        || order.last_webhook_event_id != write.expected_last_event_id
                    {
                        return Ok(WriteOutcome::PreconditionFailed);
                    }
                    order.amount_paid = write.amount_paid;
                    order.last_webhook_event_id = Some(write.event_id);
                    order.payment_error = write.payment_error;
                    if write.confirm {
                        order.status = OrderStatus::PaymentConfirmed;
                        order.payment_confirmed_at = Some(write.at);
                        order.payment_error = None;
                    }
                    order.updated_at = write.at;
                    if let Some(entry) = write.ledger {
                        self.ledger.write().await.push(entry);
                    }
                }
                ObligationRef::Settlement(id) => {
                    let mut settlements = self.settlements.write().await;
                    let settlement = match settlements.get_mut(&id) {
                        Some(s) => s,
                        None => return Ok(WriteOutcome::PreconditionFailed),
                    };
                    if settlement.status != ObligationStatus::Pending
                        || settlement.amount_paid != write.expected_amount_paid
                        || settlement.last_webhook_event_id != write.expected_last_event_id
                    {
                        return Ok(WriteOutcome::PreconditionFailed);
                    }
                    settlement.amount_paid = write.amount_paid;
                    settlement.last_webhook_event_id = Some(write.event_id);
                    if write.confirm {
                        settlement.status = ObligationStatus::Confirmed;
                        settlement.settled_at = Some(write.at);
                    }
                    settlement.updated_at = write.at;
                }
            }
            Ok(WriteOutcome::Applied(()))
        }
    }
}
