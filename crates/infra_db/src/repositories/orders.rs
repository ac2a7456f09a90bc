//! Order repository implementation
//!
//! Every status change is a single `UPDATE ... WHERE <precondition>
//! RETURNING *`, so two riders racing for one order, or a webhook racing a
//! rider, cannot both win. No row back means the precondition failed.
//! A confirming write that carries a ledger entry runs in a transaction
//! with the `payment_transactions` insert.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use core_kernel::{Currency, DayWindow, Money, OrderId, RiderId};
use domain_delivery::{
    ConditionalOrderUpdate, ContactPoint, Order, OrderChanges, OrderPrecondition, OrderQuery, OrderStatus,
    PaymentMethod, PaymentTransaction, RiderGuard,
};

use crate::error::DatabaseError;
use crate::repositories::payments::insert_entry;

/// Repository for the `orders` table
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn get_by_id(&self, order_id: Uuid) -> Result<OrderRow, DatabaseError> {
        sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1")
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Order", order_id))
    }

    pub async fn insert(&self, order: &Order) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO orders (
                id, order_number, package_description, cod_amount, currency, barcode,
                pickup_address, pickup_contact_name, pickup_contact_phone, pickup_latitude, pickup_longitude,
                delivery_address, delivery_contact_name, delivery_contact_phone, delivery_latitude, delivery_longitude,
                status, payment_method, rider_id, amount_paid, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22)
            "#,
        )
        .bind(*order.id.as_uuid())
        .bind(&order.order_number)
        .bind(&order.package_description)
        .bind(order.cod_amount.amount())
        .bind(order.cod_amount.currency().code())
        .bind(&order.barcode)
        .bind(&order.pickup.address)
        .bind(&order.pickup.contact_name)
        .bind(&order.pickup.contact_phone)
        .bind(order.pickup.latitude)
        .bind(order.pickup.longitude)
        .bind(&order.delivery.address)
        .bind(&order.delivery.contact_name)
        .bind(&order.delivery.contact_phone)
        .bind(order.delivery.latitude)
        .bind(order.delivery.longitude)
        .bind(DbOrderStatus::from(order.status))
        .bind(order.payment_method.map(DbPaymentMethod::from))
        .bind(order.rider_id.map(|id| *id.as_uuid()))
        .bind(order.amount_paid.amount())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Newest first, paginated
    pub async fn find(&self, query: &OrderQuery) -> Result<Vec<OrderRow>, DatabaseError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM orders WHERE TRUE");
        if let Some(rider_id) = query.rider_id {
            qb.push(" AND rider_id = ").push_bind(*rider_id.as_uuid());
        }
        push_status_filter(&mut qb, &query.statuses);
        if query.unassigned_only {
            qb.push(" AND rider_id IS NULL");
        }
        qb.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(i64::from(query.limit))
            .push(" OFFSET ")
            .push_bind(i64::from(query.offset));

        Ok(qb.build_query_as::<OrderRow>().fetch_all(&self.pool).await?)
    }

    pub async fn completed_between(
        &self,
        rider_id: Uuid,
        window: DayWindow,
    ) -> Result<Vec<OrderRow>, DatabaseError> {
        Ok(sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT * FROM orders
            WHERE rider_id = $1
              AND status = 'completed'
              AND completed_at BETWEEN $2 AND $3
            ORDER BY completed_at DESC
            "#,
        )
        .bind(rider_id)
        .bind(window.start)
        .bind(window.end)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Most recently updated order awaiting a QR payment
    pub async fn latest_payment_pending(&self) -> Result<Option<OrderRow>, DatabaseError> {
        Ok(sqlx::query_as::<_, OrderRow>(
            "SELECT * FROM orders WHERE status = 'payment_pending' ORDER BY updated_at DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?)
    }

    /// Order whose last applied webhook event is `event_id`
    pub async fn find_by_event_id(&self, event_id: &str) -> Result<Option<OrderRow>, DatabaseError> {
        Ok(sqlx::query_as::<_, OrderRow>(
            "SELECT * FROM orders WHERE last_webhook_event_id = $1 LIMIT 1",
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    /// Conditional update; `None` when the precondition no longer holds
    pub async fn update_conditional(
        &self,
        update: &ConditionalOrderUpdate,
        now: DateTime<Utc>,
    ) -> Result<Option<OrderRow>, DatabaseError> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE orders SET updated_at = ");
        qb.push_bind(now);
        push_changes(&mut qb, &update.changes);
        qb.push(" WHERE id = ").push_bind(*update.order_id.as_uuid());
        push_precondition(&mut qb, &update.precondition);
        qb.push(" RETURNING *");

        let mut tx = self.pool.begin().await?;
        let row = qb.build_query_as::<OrderRow>().fetch_optional(&mut *tx).await?;
        if let (Some(_), Some(entry)) = (&row, &update.ledger) {
            insert_entry(&mut *tx, entry).await?;
        }
        tx.commit().await?;
        Ok(row)
    }

    /// Accumulation write for the webhook path
    ///
    /// Applies only while the order is `payment_pending` and still carries
    /// the `amount_paid` and `last_webhook_event_id` the caller read.
    /// `ledger` is inserted only when the row was updated.
    #[allow(clippy::too_many_arguments)]
    pub async fn record_payment(
        &self,
        order_id: Uuid,
        expected_amount_paid: Decimal,
        expected_last_event_id: Option<&str>,
        amount_paid: Decimal,
        confirm: bool,
        payment_error: Option<&str>,
        event_id: &str,
        at: DateTime<Utc>,
        ledger: Option<&PaymentTransaction>,
    ) -> Result<bool, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            r#"
            UPDATE orders SET
                amount_paid = $1,
                last_webhook_event_id = $2,
                updated_at = $3,
                payment_error = CASE WHEN $4 THEN NULL ELSE $5 END,
                status = CASE WHEN $4 THEN 'payment_confirmed'::order_status ELSE status END,
                payment_confirmed_at = CASE WHEN $4 THEN $3 ELSE payment_confirmed_at END
            WHERE id = $6
              AND status = 'payment_pending'
              AND amount_paid = $7
              AND last_webhook_event_id IS NOT DISTINCT FROM $8
            "#,
        )
        .bind(amount_paid)
        .bind(event_id)
        .bind(at)
        .bind(confirm)
        .bind(payment_error)
        .bind(order_id)
        .bind(expected_amount_paid)
        .bind(expected_last_event_id)
        .execute(&mut *tx)
        .await?;
        let applied = result.rows_affected() == 1;
        if let (true, Some(entry)) = (applied, ledger) {
            insert_entry(&mut *tx, entry).await?;
        }
        tx.commit().await?;
        Ok(applied)
    }
}

fn push_status_filter(qb: &mut QueryBuilder<'_, Postgres>, statuses: &[OrderStatus]) {
    if statuses.is_empty() {
        return;
    }
    qb.push(" AND status IN (");
    let mut separated = qb.separated(", ");
    for status in statuses {
        separated.push_bind(DbOrderStatus::from(*status));
    }
    separated.push_unseparated(")");
}

fn push_precondition(qb: &mut QueryBuilder<'_, Postgres>, precondition: &OrderPrecondition) {
    push_status_filter(qb, &precondition.statuses);
    match precondition.rider {
        RiderGuard::Unassigned => {
            qb.push(" AND rider_id IS NULL");
        }
        RiderGuard::AssignedTo(rider_id) => {
            qb.push(" AND rider_id = ").push_bind(*rider_id.as_uuid());
        }
        RiderGuard::Any => {}
    }
}

fn push_changes(qb: &mut QueryBuilder<'_, Postgres>, changes: &OrderChanges) {
    if let Some(status) = changes.status {
        qb.push(", status = ").push_bind(DbOrderStatus::from(status));
    }
    if let Some(rider_id) = changes.rider_id {
        qb.push(", rider_id = ").push_bind(*rider_id.as_uuid());
    }
    if let Some(method) = changes.payment_method {
        qb.push(", payment_method = ").push_bind(DbPaymentMethod::from(method));
    }
    for (column, value) in [
        ("accepted_at", changes.accepted_at),
        ("picked_up_at", changes.picked_up_at),
        ("payment_confirmed_at", changes.payment_confirmed_at),
        ("completed_at", changes.completed_at),
    ] {
        if let Some(at) = value {
            qb.push(format!(", {} = ", column)).push_bind(at);
        }
    }
    for (column, value) in [
        ("pod_photo_url", &changes.pod_photo_url),
        ("cash_audit_note", &changes.cash_audit_note),
        ("payment_reference", &changes.payment_reference),
    ] {
        if let Some(text) = value {
            qb.push(format!(", {} = ", column)).push_bind(text.clone());
        }
    }
    if let Some(lat) = changes.pod_latitude {
        qb.push(", pod_latitude = ").push_bind(lat);
    }
    if let Some(lng) = changes.pod_longitude {
        qb.push(", pod_longitude = ").push_bind(lng);
    }
    if let Some(paid) = changes.amount_paid {
        qb.push(", amount_paid = ").push_bind(paid.amount());
    }
    if let Some(error) = &changes.payment_error {
        qb.push(", payment_error = ").push_bind(error.clone());
    }
}

// ============================================================================
// Row types
// ============================================================================

/// One row of `orders`
#[derive(Debug, Clone, FromRow)]
pub struct OrderRow {
    pub id: Uuid,
    pub order_number: String,
    pub package_description: String,
    pub cod_amount: Decimal,
    pub currency: String,
    pub barcode: String,
    pub pickup_address: String,
    pub pickup_contact_name: String,
    pub pickup_contact_phone: String,
    pub pickup_latitude: Option<f64>,
    pub pickup_longitude: Option<f64>,
    pub delivery_address: String,
    pub delivery_contact_name: String,
    pub delivery_contact_phone: String,
    pub delivery_latitude: Option<f64>,
    pub delivery_longitude: Option<f64>,
    pub status: DbOrderStatus,
    pub payment_method: Option<DbPaymentMethod>,
    pub rider_id: Option<Uuid>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub arrived_at: Option<DateTime<Utc>>,
    pub payment_confirmed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub pod_photo_url: Option<String>,
    pub pod_latitude: Option<f64>,
    pub pod_longitude: Option<f64>,
    pub cash_audit_note: Option<String>,
    pub amount_paid: Decimal,
    pub payment_error: Option<String>,
    pub payment_reference: Option<String>,
    pub last_webhook_event_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = DatabaseError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let currency: Currency = row
            .currency
            .parse()
            .map_err(|e| DatabaseError::InvalidRow(format!("order {}: {}", row.id, e)))?;

        Ok(Order {
            id: OrderId::from_uuid(row.id),
            order_number: row.order_number,
            package_description: row.package_description,
            cod_amount: Money::new(row.cod_amount, currency),
            barcode: row.barcode,
            pickup: ContactPoint {
                address: row.pickup_address,
                contact_name: row.pickup_contact_name,
                contact_phone: row.pickup_contact_phone,
                latitude: row.pickup_latitude,
                longitude: row.pickup_longitude,
            },
            delivery: ContactPoint {
                address: row.delivery_address,
                contact_name: row.delivery_contact_name,
                contact_phone: row.delivery_contact_phone,
                latitude: row.delivery_latitude,
                longitude: row.delivery_longitude,
            },
            status: row.status.into(),
            payment_method: row.payment_method.map(Into::into),
            rider_id: row.rider_id.map(RiderId::from_uuid),
            accepted_at: row.accepted_at,
            picked_up_at: row.picked_up_at,
            arrived_at: row.arrived_at,
            payment_confirmed_at: row.payment_confirmed_at,
            completed_at: row.completed_at,
            pod_photo_url: row.pod_photo_url,
            pod_latitude: row.pod_latitude,
            pod_longitude: row.pod_longitude,
            cash_audit_note: row.cash_audit_note,
            amount_paid: Money::new(row.amount_paid, currency),
            payment_error: row.payment_error,
            payment_reference: row.payment_reference,
            last_webhook_event_id: row.last_webhook_event_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// ============================================================================
// Type definitions
// ============================================================================

/// Order status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "order_status", rename_all = "snake_case")]
pub enum DbOrderStatus {
    Pending,
    Accepted,
    PickedUp,
    Arrived,
    Delivering,
    PaymentPending,
    PaymentConfirmed,
    Completed,
    Failed,
}

impl From<OrderStatus> for DbOrderStatus {
    fn from(status: OrderStatus) -> Self {
        match status {
            OrderStatus::Pending => DbOrderStatus::Pending,
            OrderStatus::Accepted => DbOrderStatus::Accepted,
            OrderStatus::PickedUp => DbOrderStatus::PickedUp,
            OrderStatus::Arrived => DbOrderStatus::Arrived,
            OrderStatus::Delivering => DbOrderStatus::Delivering,
            OrderStatus::PaymentPending => DbOrderStatus::PaymentPending,
            OrderStatus::PaymentConfirmed => DbOrderStatus::PaymentConfirmed,
            OrderStatus::Completed => DbOrderStatus::Completed,
            OrderStatus::Failed => DbOrderStatus::Failed,
        }
    }
}

impl From<DbOrderStatus> for OrderStatus {
    fn from(status: DbOrderStatus) -> Self {
        match status {
            DbOrderStatus::Pending => OrderStatus::Pending,
            DbOrderStatus::Accepted => OrderStatus::Accepted,
            DbOrderStatus::PickedUp => OrderStatus::PickedUp,
            DbOrderStatus::Arrived => OrderStatus::Arrived,
            DbOrderStatus::Delivering => OrderStatus::Delivering,
            DbOrderStatus::PaymentPending => OrderStatus::PaymentPending,
            DbOrderStatus::PaymentConfirmed => OrderStatus::PaymentConfirmed,
            DbOrderStatus::Completed => OrderStatus::Completed,
            DbOrderStatus::Failed => OrderStatus::Failed,
        }
    }
}

/// Payment method enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "payment_method", rename_all = "snake_case")]
pub enum DbPaymentMethod {
    Cash,
    Qrph,
}

impl From<PaymentMethod> for DbPaymentMethod {
    fn from(method: PaymentMethod) -> Self {
        match method {
            PaymentMethod::Cash => DbPaymentMethod::Cash,
            PaymentMethod::Qrph => DbPaymentMethod::Qrph,
        }
    }
}

impl From<DbPaymentMethod> for PaymentMethod {
    fn from(method: DbPaymentMethod) -> Self {
        match method {
            DbPaymentMethod::Cash => PaymentMethod::Cash,
            DbPaymentMethod::Qrph => PaymentMethod::Qrph,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Execute;

    #[test]
    fn test_status_round_trips_through_db_enum() {
        for status in OrderStatus::ALL {
            assert_eq!(OrderStatus::from(DbOrderStatus::from(status)), status);
        }
    }

    #[test]
    fn test_claim_precondition_sql() {
        let rider = RiderId::new();
        let update = ConditionalOrderUpdate::new(OrderId::new())
            .expect_status(&[OrderStatus::Pending])
            .expect_rider(RiderGuard::Unassigned)
            .with_changes(OrderChanges::status(OrderStatus::Accepted).assign(rider));

        let mut qb = QueryBuilder::<Postgres>::new("UPDATE orders SET updated_at = ");
        qb.push_bind(Utc::now());
        push_changes(&mut qb, &update.changes);
        qb.push(" WHERE id = ").push_bind(*update.order_id.as_uuid());
        push_precondition(&mut qb, &update.precondition);
        let sql = qb.build().sql().to_string();

        assert_eq!(
            sql,
            "UPDATE orders SET updated_at = $1, status = $2, rider_id = $3 \
             WHERE id = $4 AND status IN ($5) AND rider_id IS NULL"
        );
    }

    #[test]
    fn test_clearing_payment_error_binds_null() {
        let changes = OrderChanges {
            payment_error: Some(None),
            amount_paid: Some(Money::php(Decimal::ZERO)),
            ..OrderChanges::status(OrderStatus::PaymentPending)
        };
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE orders SET updated_at = NOW()");
        push_changes(&mut qb, &changes);
        let sql = qb.build().sql().to_string();

        assert!(sql.ends_with("status = $1, amount_paid = $2, payment_error = $3"));
    }

    #[test]
    fn test_row_with_unknown_currency_is_rejected() {
        let now = Utc::now();
        let row = OrderRow {
            id: Uuid::new_v4(),
            order_number: "ORD-1".into(),
            package_description: "Box".into(),
            cod_amount: Decimal::new(75000, 2),
            currency: "XXX".into(),
            barcode: "B".into(),
            pickup_address: "a".into(),
            pickup_contact_name: "n".into(),
            pickup_contact_phone: "p".into(),
            pickup_latitude: None,
            pickup_longitude: None,
            delivery_address: "a".into(),
            delivery_contact_name: "n".into(),
            delivery_contact_phone: "p".into(),
            delivery_latitude: None,
            delivery_longitude: None,
            status: DbOrderStatus::Pending,
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
            amount_paid: Decimal::ZERO,
            payment_error: None,
            payment_reference: None,
            last_webhook_event_id: None,
            created_at: now,
            updated_at: now,
        };

        assert!(matches!(Order::try_from(row), Err(DatabaseError::InvalidRow(_))));
    }
}
