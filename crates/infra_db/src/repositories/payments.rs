//! Payment ledger repository
//!
//! Rows are only inserted inside the transaction of the order update that
//! confirms the payment, so [`insert_entry`] takes a connection rather than
//! the pool.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use core_kernel::{Currency, Money, OrderId, PaymentTransactionId};
use domain_delivery::{ConfirmationSource, PaymentTransaction};

use crate::error::DatabaseError;
use crate::repositories::orders::DbPaymentMethod;

/// Repository for the `payment_transactions` table
#[derive(Debug, Clone)]
pub struct PaymentTransactionRepository {
    pool: PgPool,
}

impl PaymentTransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Entries for one order, oldest first
    pub async fn for_order(&self, order_id: Uuid) -> Result<Vec<PaymentTransactionRow>, DatabaseError> {
        Ok(sqlx::query_as::<_, PaymentTransactionRow>(
            "SELECT * FROM payment_transactions WHERE order_id = $1 ORDER BY confirmed_at, created_at",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?)
    }
}

pub(crate) async fn insert_entry(
    conn: &mut PgConnection,
    entry: &PaymentTransaction,
) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO payment_transactions (
            id, order_id, payment_method, amount, currency, status, source,
            provider_reference, webhook_event_id, confirmed_at
        )
        VALUES ($1, $2, $3, $4, $5, 'confirmed', $6, $7, $8, $9)
        "#,
    )
    .bind(*entry.id.as_uuid())
    .bind(*entry.order_id.as_uuid())
    .bind(DbPaymentMethod::from(entry.payment_method))
    .bind(entry.amount.amount())
    .bind(entry.amount.currency().code())
    .bind(DbConfirmationSource::from(entry.source))
    .bind(entry.provider_reference.as_deref())
    .bind(entry.webhook_event_id.as_deref())
    .bind(entry.confirmed_at)
    .execute(conn)
    .await?;
    Ok(())
}

/// One row of `payment_transactions`
#[derive(Debug, Clone, FromRow)]
pub struct PaymentTransactionRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub payment_method: DbPaymentMethod,
    pub amount: Decimal,
    pub currency: String,
    pub status: String,
    pub source: DbConfirmationSource,
    pub provider_reference: Option<String>,
    pub webhook_event_id: Option<String>,
    pub confirmed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<PaymentTransactionRow> for PaymentTransaction {
    type Error = DatabaseError;

    fn try_from(row: PaymentTransactionRow) -> Result<Self, Self::Error> {
        let currency: Currency = row
            .currency
            .parse()
            .map_err(|e| DatabaseError::InvalidRow(format!("payment transaction {}: {}", row.id, e)))?;

        Ok(PaymentTransaction {
            id: PaymentTransactionId::from_uuid(row.id),
            order_id: OrderId::from_uuid(row.order_id),
            payment_method: row.payment_method.into(),
            amount: Money::new(row.amount, currency),
            source: row.source.into(),
            provider_reference: row.provider_reference,
            webhook_event_id: row.webhook_event_id,
            confirmed_at: row.confirmed_at,
        })
    }
}

/// Confirmation source enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "confirmation_source", rename_all = "snake_case")]
pub enum DbConfirmationSource {
    Rider,
    Webhook,
}

impl From<ConfirmationSource> for DbConfirmationSource {
    fn from(source: ConfirmationSource) -> Self {
        match source {
            ConfirmationSource::Rider => DbConfirmationSource::Rider,
            ConfirmationSource::Webhook => DbConfirmationSource::Webhook,
        }
    }
}

impl From<DbConfirmationSource> for ConfirmationSource {
    fn from(source: DbConfirmationSource) -> Self {
        match source {
            DbConfirmationSource::Rider => ConfirmationSource::Rider,
            DbConfirmationSource::Webhook => ConfirmationSource::Webhook,
        }
    }
}
