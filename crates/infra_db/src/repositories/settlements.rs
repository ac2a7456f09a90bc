//! Settlement repository implementation
//!
//! One row per (rider, business day). Opening a settlement upserts that row
//! back to `pending` with nothing paid unless it is already `confirmed`.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use core_kernel::{Currency, Money, RiderId, SettlementId};
use domain_payment::{ObligationStatus, SettlementInit, SettlementObligation};

use crate::error::DatabaseError;

/// Repository for the `settlements` table
#[derive(Debug, Clone)]
pub struct SettlementRepository {
    pool: PgPool,
}

impl SettlementRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<SettlementRow, DatabaseError> {
        sqlx::query_as::<_, SettlementRow>("SELECT * FROM settlements WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Settlement", id))
    }

    pub async fn find_by_rider_date(
        &self,
        rider_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<SettlementRow>, DatabaseError> {
        Ok(sqlx::query_as::<_, SettlementRow>(
            "SELECT * FROM settlements WHERE rider_id = $1 AND settlement_date = $2",
        )
        .bind(rider_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?)
    }

    /// Most recently initiated pending settlement
    pub async fn latest_pending(&self) -> Result<Option<SettlementRow>, DatabaseError> {
        Ok(sqlx::query_as::<_, SettlementRow>(
            "SELECT * FROM settlements WHERE status = 'pending' ORDER BY initiated_at DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?)
    }

    pub async fn find_by_event_id(&self, event_id: &str) -> Result<Option<SettlementRow>, DatabaseError> {
        Ok(sqlx::query_as::<_, SettlementRow>(
            "SELECT * FROM settlements WHERE last_webhook_event_id = $1 LIMIT 1",
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    /// Upsert; `None` when the existing row is already confirmed
    pub async fn open(&self, init: &SettlementInit) -> Result<Option<SettlementRow>, DatabaseError> {
        Ok(sqlx::query_as::<_, SettlementRow>(
            r#"
            INSERT INTO settlements (
                id, rider_id, settlement_date, amount_expected, currency, amount_paid,
                status, payment_reference, initiated_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, 0, 'pending', $6, $7, $7, $7)
            ON CONFLICT (rider_id, settlement_date) DO UPDATE SET
                amount_expected = EXCLUDED.amount_expected,
                currency = EXCLUDED.currency,
                amount_paid = 0,
                status = 'pending',
                payment_reference = EXCLUDED.payment_reference,
                initiated_at = EXCLUDED.initiated_at,
                updated_at = EXCLUDED.updated_at
            WHERE settlements.status <> 'confirmed'
            RETURNING *
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(*init.rider_id.as_uuid())
        .bind(init.settlement_date)
        .bind(init.amount.amount())
        .bind(init.amount.currency().code())
        .bind(&init.payment_reference)
        .bind(init.at)
        .fetch_optional(&self.pool)
        .await?)
    }

    /// Accumulation write; false when the precondition no longer holds
    #[allow(clippy::too_many_arguments)]
    pub async fn record_payment(
        &self,
        id: Uuid,
        expected_amount_paid: Decimal,
        expected_last_event_id: Option<&str>,
        amount_paid: Decimal,
        confirm: bool,
        event_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE settlements SET
                amount_paid = $1,
                last_webhook_event_id = $2,
                updated_at = $3,
                status = CASE WHEN $4 THEN 'confirmed'::settlement_status ELSE status END,
                settled_at = CASE WHEN $4 THEN $3 ELSE settled_at END
            WHERE id = $5
              AND status = 'pending'
              AND amount_paid = $6
              AND last_webhook_event_id IS NOT DISTINCT FROM $7
            "#,
        )
        .bind(amount_paid)
        .bind(event_id)
        .bind(at)
        .bind(confirm)
        .bind(id)
        .bind(expected_amount_paid)
        .bind(expected_last_event_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

/// One row of `settlements`
#[derive(Debug, Clone, FromRow)]
pub struct SettlementRow {
    pub id: Uuid,
    pub rider_id: Uuid,
    pub settlement_date: NaiveDate,
    pub amount_expected: Decimal,
    pub currency: String,
    pub amount_paid: Decimal,
    pub status: DbSettlementStatus,
    pub payment_reference: Option<String>,
    pub last_webhook_event_id: Option<String>,
    pub initiated_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<SettlementRow> for SettlementObligation {
    type Error = DatabaseError;

    fn try_from(row: SettlementRow) -> Result<Self, Self::Error> {
        let currency: Currency = row
            .currency
            .parse()
            .map_err(|e| DatabaseError::InvalidRow(format!("settlement {}: {}", row.id, e)))?;

        Ok(SettlementObligation {
            id: SettlementId::from_uuid(row.id),
            rider_id: RiderId::from_uuid(row.rider_id),
            settlement_date: row.settlement_date,
            amount_expected: Money::new(row.amount_expected, currency),
            amount_paid: Money::new(row.amount_paid, currency),
            status: row.status.into(),
            payment_reference: row.payment_reference,
            last_webhook_event_id: row.last_webhook_event_id,
            initiated_at: row.initiated_at,
            settled_at: row.settled_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Settlement status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "settlement_status", rename_all = "snake_case")]
pub enum DbSettlementStatus {
    Pending,
    Confirmed,
}

impl From<DbSettlementStatus> for ObligationStatus {
    fn from(status: DbSettlementStatus) -> Self {
        match status {
            DbSettlementStatus::Pending => ObligationStatus::Pending,
            DbSettlementStatus::Confirmed => ObligationStatus::Confirmed,
        }
    }
}
