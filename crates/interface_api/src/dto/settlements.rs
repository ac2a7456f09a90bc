//! Settlement DTOs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{RiderId, SettlementId};
use domain_payment::{ObligationStatus, SettlementInitiation, SettlementStatus};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateSettlementRequest {
    /// Defaults to the acting rider
    pub rider_id: Option<RiderId>,
    /// Defaults to today in the configured timezone
    pub settlement_date: Option<NaiveDate>,
    pub amount: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementInitiationResponse {
    pub success: bool,
    pub settlement_id: SettlementId,
    pub payment_reference: Option<String>,
    pub static_qr_image_url: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub expected_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount_paid: Decimal,
}

impl From<SettlementInitiation> for SettlementInitiationResponse {
    fn from(i: SettlementInitiation) -> Self {
        Self {
            success: true,
            settlement_id: i.settlement.id,
            payment_reference: i.settlement.payment_reference,
            static_qr_image_url: i.static_qr_image_url,
            expected_amount: i.settlement.amount_expected.amount(),
            amount_paid: i.settlement.amount_paid.amount(),
        }
    }
}

/// Either `settlementId`, or `riderId` with `date`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementStatusQuery {
    #[serde(alias = "settlement_id")]
    pub settlement_id: Option<SettlementId>,
    #[serde(alias = "rider_id")]
    pub rider_id: Option<RiderId>,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementStatusResponse {
    pub settlement_id: SettlementId,
    pub rider_id: RiderId,
    pub settlement_date: NaiveDate,
    pub status: ObligationStatus,
    #[serde(with = "rust_decimal::serde::float")]
    pub expected_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount_paid: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub remaining_amount: Decimal,
    pub is_settlement_complete: bool,
    pub is_insufficient: bool,
    pub payment_reference: Option<String>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl From<SettlementStatus> for SettlementStatusResponse {
    fn from(s: SettlementStatus) -> Self {
        Self {
            settlement_id: s.settlement_id,
            rider_id: s.rider_id,
            settlement_date: s.settlement_date,
            status: s.status,
            expected_amount: s.expected_amount.amount(),
            amount_paid: s.amount_paid.amount(),
            remaining_amount: s.remaining_amount.amount(),
            is_settlement_complete: s.is_settlement_complete,
            is_insufficient: s.is_insufficient,
            payment_reference: s.payment_reference,
            settled_at: s.settled_at,
        }
    }
}
