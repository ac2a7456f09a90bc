//! Delivery Domain Ports
//!
//! The `OrderStore` trait is everything the delivery workflow needs from
//! persistence. Adapters:
//!
//! - **PostgreSQL**: `infra_db::PostgresOrderStore`
//! - **Mock**: [`mock::MockOrderStore`], in-memory, for tests
//!
//! Every status change goes through [`OrderStore::update_order`], a
//! conditional write. The adapter applies the changes only if the row still
//! satisfies the [`OrderPrecondition`] at write time and otherwise reports
//! [`WriteOutcome::PreconditionFailed`] without touching the row. A ledger
//! entry attached with [`ConditionalOrderUpdate::record`] is stored in the
//! same transaction, only when the write applies.
//!
//! ```rust,ignore
//! let update = ConditionalOrderUpdate::new(order_id)
//!     .expect_status(&[OrderStatus::Pending])
//!     .expect_rider(RiderGuard::Unassigned)
//!     .with_changes(OrderChanges::status(OrderStatus::Accepted).assign(rider_id));
//!
//! match store.update_order(update).await? {
//!     WriteOutcome::Applied(order) => { /* claimed */ }
//!     WriteOutcome::PreconditionFailed => { /* someone else won */ }
//! }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use core_kernel::{DayWindow, DomainPort, HealthCheckable, Money, OrderId, PortError, RiderId, WriteOutcome};

use crate::ledger::PaymentTransaction;
use crate::order::{Order, OrderStatus, PaymentMethod};

/// Which rider assignment a conditional write expects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiderGuard {
    /// `rider_id IS NULL`
    Unassigned,
    /// `rider_id = <rider>`
    AssignedTo(RiderId),
    /// No rider predicate
    Any,
}

impl RiderGuard {
    pub fn matches(&self, rider_id: Option<RiderId>) -> bool {
        match self {
            RiderGuard::Unassigned => rider_id.is_none(),
            RiderGuard::AssignedTo(expected) => rider_id == Some(*expected),
            RiderGuard::Any => true,
        }
    }
}

/// Predicate that must hold on the stored row for a write to apply
#[derive(Debug, Clone, PartialEq)]
pub struct OrderPrecondition {
    /// Allowed current statuses; empty means any
    pub statuses: Vec<OrderStatus>,
    pub rider: RiderGuard,
}

impl Default for OrderPrecondition {
    fn default() -> Self {
        Self {
            statuses: Vec::new(),
            rider: RiderGuard::Any,
        }
    }
}

impl OrderPrecondition {
    pub fn matches(&self, order: &Order) -> bool {
        (self.statuses.is_empty() || self.statuses.contains(&order.status))
            && self.rider.matches(order.rider_id)
    }
}

/// Field changes applied by a conditional write
///
/// `None` leaves a column untouched. `payment_error` is doubly optional so a
/// write can clear it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderChanges {
    pub status: Option<OrderStatus>,
    pub rider_id: Option<RiderId>,
    pub payment_method: Option<PaymentMethod>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub payment_confirmed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub pod_photo_url: Option<String>,
    pub pod_latitude: Option<f64>,
    pub pod_longitude: Option<f64>,
    pub cash_audit_note: Option<String>,
    pub payment_reference: Option<String>,
    pub amount_paid: Option<Money>,
    pub payment_error: Option<Option<String>>,
}

impl OrderChanges {
    pub fn status(status: OrderStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn assign(mut self, rider_id: RiderId) -> Self {
        self.rider_id = Some(rider_id);
        self
    }

    /// Applies the changes in place and bumps `updated_at`
    pub fn apply_to(&self, order: &mut Order, now: DateTime<Utc>) {
        if let Some(status) = self.status {
            order.status = status;
        }
        if let Some(rider_id) = self.rider_id {
            order.rider_id = Some(rider_id);
        }
        if let Some(method) = self.payment_method {
            order.payment_method = Some(method);
        }
        if let Some(at) = self.accepted_at {
            order.accepted_at = Some(at);
        }
        if let Some(at) = self.picked_up_at {
            order.picked_up_at = Some(at);
        }
        if let Some(at) = self.payment_confirmed_at {
            order.payment_confirmed_at = Some(at);
        }
        if let Some(at) = self.completed_at {
            order.completed_at = Some(at);
        }
        if let Some(url) = &self.pod_photo_url {
            order.pod_photo_url = Some(url.clone());
        }
        if let Some(lat) = self.pod_latitude {
            order.pod_latitude = Some(lat);
        }
        if let Some(lng) = self.pod_longitude {
            order.pod_longitude = Some(lng);
        }
        if let Some(note) = &self.cash_audit_note {
            order.cash_audit_note = Some(note.clone());
        }
        if let Some(reference) = &self.payment_reference {
            order.payment_reference = Some(reference.clone());
        }
        if let Some(paid) = self.amount_paid {
            order.amount_paid = paid;
        }
        if let Some(error) = &self.payment_error {
            order.payment_error = error.clone();
        }
        order.updated_at = now;
    }
}

/// A write that applies only while its precondition holds
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalOrderUpdate {
    pub order_id: OrderId,
    pub precondition: OrderPrecondition,
    pub changes: OrderChanges,
    pub ledger: Option<PaymentTransaction>,
}

impl ConditionalOrderUpdate {
    pub fn new(order_id: OrderId) -> Self {
        Self {
            order_id,
            precondition: OrderPrecondition::default(),
            changes: OrderChanges::default(),
            ledger: None,
        }
    }

    pub fn expect_status(mut self, statuses: &[OrderStatus]) -> Self {
        self.precondition.statuses = statuses.to_vec();
        self
    }

    pub fn expect_rider(mut self, guard: RiderGuard) -> Self {
        self.precondition.rider = guard;
        self
    }

    pub fn with_changes(mut self, changes: OrderChanges) -> Self {
        self.changes = changes;
        self
    }

    /// Ledger entry stored iff the write applies
    pub fn record(mut self, entry: PaymentTransaction) -> Self {
        self.ledger = Some(entry);
        self
    }
}

/// Query parameters for listing orders
#[derive(Debug, Clone, PartialEq)]
pub struct OrderQuery {
    pub rider_id: Option<RiderId>,
    /// Allowed statuses; empty means any
    pub statuses: Vec<OrderStatus>,
    /// Only orders with no rider assigned
    pub unassigned_only: bool,
    pub limit: u32,
    pub offset: u32,
}

impl Default for OrderQuery {
    fn default() -> Self {
        Self {
            rider_id: None,
            statuses: Vec::new(),
            unassigned_only: false,
            limit: 50,
            offset: 0,
        }
    }
}

impl OrderQuery {
    /// Orders any rider may claim
    pub fn available() -> Self {
        Self {
            statuses: vec![OrderStatus::Pending],
            unassigned_only: true,
            ..Default::default()
        }
    }

    /// Orders assigned to a rider
    pub fn for_rider(rider_id: RiderId) -> Self {
        Self {
            rider_id: Some(rider_id),
            ..Default::default()
        }
    }

    pub fn with_statuses(mut self, statuses: &[OrderStatus]) -> Self {
        self.statuses = statuses.to_vec();
        self
    }

    /// One-based page of `limit` rows
    pub fn page(mut self, page: u32, limit: u32) -> Self {
        self.limit = limit.max(1);
        self.offset = page.saturating_sub(1).saturating_mul(self.limit);
        self
    }

    pub fn matches(&self, order: &Order) -> bool {
        self.rider_id.map_or(true, |rider| order.rider_id == Some(rider))
            && (self.statuses.is_empty() || self.statuses.contains(&order.status))
            && (!self.unassigned_only || order.rider_id.is_none())
    }
}

/// Port for order persistence
#[async_trait]
pub trait OrderStore: DomainPort + HealthCheckable {
    /// Fetches an order by id
    async fn get_order(&self, id: OrderId) -> Result<Order, PortError>;

    /// Inserts a freshly created order
    async fn insert_order(&self, order: &Order) -> Result<(), PortError>;

    /// Lists orders newest first
    async fn find_orders(&self, query: &OrderQuery) -> Result<Vec<Order>, PortError>;

    /// Orders a rider completed inside one business day, newest first
    async fn completed_between(
        &self,
        rider_id: RiderId,
        window: DayWindow,
    ) -> Result<Vec<Order>, PortError>;

    /// Applies `update.changes` iff `update.precondition` holds, atomically
    async fn update_order(
        &self,
        update: ConditionalOrderUpdate,
    ) -> Result<WriteOutcome<Order>, PortError>;

    /// Ledger entries for an order, oldest first
    async fn payment_transactions(&self, order_id: OrderId) -> Result<Vec<PaymentTransaction>, PortError>;
}

#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::sync::RwLock;

    use core_kernel::HealthCheckResult;

    /// Order table shared between mock adapters
    pub type SharedOrders = Arc<RwLock<HashMap<OrderId, Order>>>;

    /// Payment ledger shared between mock adapters
    pub type SharedLedger = Arc<RwLock<Vec<PaymentTransaction>>>;

    /// Injected transient failures shared between mock adapters
    #[derive(Debug, Clone, Default)]
    pub struct FaultInjector(Arc<AtomicU32>);

    impl FaultInjector {
        /// Makes the next `n` store calls fail with a connection error
        pub fn fail_next(&self, n: u32) {
            self.0.store(n, Ordering::SeqCst);
        }

        pub fn check(&self, operation: &str) -> Result<(), PortError> {
            let tripped = self
                .0
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if tripped {
                Err(PortError::connection(format!("injected failure in {}", operation)))
            } else {
                Ok(())
            }
        }
    }

    /// In-memory mock implementation of OrderStore
    #[derive(Debug, Clone, Default)]
    pub struct MockOrderStore {
        orders: SharedOrders,
        ledger: SharedLedger,
        faults: FaultInjector,
    }

    impl MockOrderStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Pre-populates with orders for testing
        pub async fn with_orders(orders: Vec<Order>) -> Self {
            let store = Self::new();
            for order in orders {
                store.orders.write().await.insert(order.id, order);
            }
            store
        }

        /// Handle to the underlying table, for adapters that share it
        pub fn shared(&self) -> SharedOrders {
            Arc::clone(&self.orders)
        }

        pub fn shared_ledger(&self) -> SharedLedger {
            Arc::clone(&self.ledger)
        }

        pub fn faults(&self) -> FaultInjector {
            self.faults.clone()
        }

        pub fn fail_next(&self, n: u32) {
            self.faults.fail_next(n);
        }
    }

    impl DomainPort for MockOrderStore {}

    #[async_trait]
    impl HealthCheckable for MockOrderStore {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult::healthy("mock-order-store")
        }
    }

    #[async_trait]
    impl OrderStore for MockOrderStore {
        async fn get_order(&self, id: OrderId) -> Result<Order, PortError> {
            self.faults.check("get_order")?;
            self.orders
                .read()
                .await
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Order", id))
        }

        async fn insert_order(&self, order: &Order) -> Result<(), PortError> {
            self.faults.check("insert_order")?;
            let mut orders = self.orders.write().await;
            if orders.contains_key(&order.id) {
                return Err(PortError::Conflict {
                    message: format!("order {} already exists", order.id),
                });
            }
            orders.insert(order.id, order.clone());
            Ok(())
        }

        async fn find_orders(&self, query: &OrderQuery) -> Result<Vec<Order>, PortError> {
            self.faults.check("find_orders")?;
            let orders = self.orders.read().await;
            let mut results: Vec<Order> = orders
                .values()
                .filter(|order| query.matches(order))
                .cloned()
                .collect();
            results.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(results
                .into_iter()
                .skip(query.offset as usize)
                .take(query.limit as usize)
                .collect())
        }

        async fn completed_between(
            &self,
            rider_id: RiderId,
            window: DayWindow,
        ) -> Result<Vec<Order>, PortError> {
            self.faults.check("completed_between")?;
            let orders = self.orders.read().await;
            let mut results: Vec<Order> = orders
                .values()
                .filter(|order| {
                    order.status == OrderStatus::Completed
                        && order.rider_id == Some(rider_id)
                        && order.completed_at.map_or(false, |at| window.contains(at))
                })
                .cloned()
                .collect();
            results.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
            Ok(results)
        }

        async fn update_order(
            &self,
            update: ConditionalOrderUpdate,
        ) -> Result<WriteOutcome<Order>, PortError> {
            self.faults.check("update_order")?;
            let mut orders = self.orders.write().await;
            let order = match orders.get_mut(&update.order_id) {
                Some(order) => order,
                None => return Ok(WriteOutcome::PreconditionFailed),
            };
            if !update.precondition.matches(order) {
                return Ok(WriteOutcome::PreconditionFailed);
            }
            update.changes.apply_to(order, Utc::now());
            if let Some(entry) = update.ledger {
                self.ledger.write().await.push(entry);
            }
            Ok(WriteOutcome::Applied(order.clone()))
        }

        async fn payment_transactions(&self, order_id: OrderId) -> Result<Vec<PaymentTransaction>, PortError> {
            self.faults.check("payment_transactions")?;
            let mut entries: Vec<PaymentTransaction> = self
                .ledger
                .read()
                .await
                .iter()
                .filter(|entry| entry.order_id == order_id)
                .cloned()
                .collect();
            entries.sort_by_key(|entry| entry.confirmed_at);
            Ok(entries)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockOrderStore;
    use super::*;
    use crate::order::{ContactPoint, NewOrder};
    use rust_decimal_macros::dec;

    fn order(status: OrderStatus, rider_id: Option<RiderId>) -> Order {
        let contact = ContactPoint {
            address: "Taft Ave".to_string(),
            contact_name: "Lito".to_string(),
            contact_phone: "+639170000002".to_string(),
            latitude: None,
            longitude: None,
        };
        let mut order = Order::create(NewOrder {
            package_description: "Phone case".to_string(),
            cod_amount: Money::php(dec!(750)),
            barcode: "PKG-3".to_string(),
            pickup: contact.clone(),
            delivery: contact,
        })
        .unwrap();
        order.status = status;
        order.rider_id = rider_id;
        order
    }

    #[test]
    fn test_precondition_checks_status_and_rider_only() {
        let rider = RiderId::new();
        let mut paid = order(OrderStatus::PaymentPending, Some(rider));
        paid.amount_paid = Money::php(dec!(300));
        let precondition = OrderPrecondition {
            statuses: vec![OrderStatus::PaymentPending],
            rider: RiderGuard::AssignedTo(rider),
        };

        assert!(precondition.matches(&paid));
        assert!(!precondition.matches(&order(OrderStatus::PaymentPending, Some(RiderId::new()))));
        assert!(!precondition.matches(&order(OrderStatus::Delivering, Some(rider))));
    }

    #[tokio::test]
    async fn test_ledger_entry_stored_only_when_write_applies() {
        let rider = RiderId::new();
        let delivering = order(OrderStatus::Delivering, Some(rider));
        let order_id = delivering.id;
        let store = MockOrderStore::with_orders(vec![delivering.clone()]).await;
        let entry = || PaymentTransaction::rider_confirmed(&delivering, PaymentMethod::Cash, None, Utc::now());

        let missed = store
            .update_order(
                ConditionalOrderUpdate::new(order_id)
                    .expect_status(&[OrderStatus::PaymentPending])
                    .with_changes(OrderChanges::status(OrderStatus::PaymentConfirmed))
                    .record(entry()),
            )
            .await
            .unwrap();
        assert_eq!(missed, WriteOutcome::PreconditionFailed);
        assert!(store.payment_transactions(order_id).await.unwrap().is_empty());

        let applied = store
            .update_order(
                ConditionalOrderUpdate::new(order_id)
                    .expect_status(&[OrderStatus::Delivering])
                    .with_changes(OrderChanges::status(OrderStatus::PaymentConfirmed))
                    .record(entry()),
            )
            .await
            .unwrap();
        assert!(matches!(applied, WriteOutcome::Applied(_)));
        assert_eq!(store.payment_transactions(order_id).await.unwrap().len(), 1);
    }
}
