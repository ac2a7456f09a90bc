//! Settlement initiation and payment status projections
//!
//! Status projections are pure reads and safe to poll. Riders poll them
//! while waiting on a QR transfer.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use core_kernel::{human_reference, Money, OrderId, RiderId, SettlementId, WriteOutcome};
use domain_delivery::{OrderStatus, PaymentMethod};

use crate::error::PaymentError;
use crate::obligation::{Obligation, ObligationStatus, SettlementObligation};
use crate::ports::{ObligationStore, SettlementInit};

/// Returned when a settlement is opened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementInitiation {
    pub settlement: SettlementObligation,
    pub static_qr_image_url: String,
}

/// Poll view of an order's payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPaymentStatus {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub payment_method: Option<PaymentMethod>,
    pub expected_amount: Money,
    pub amount_paid: Money,
    pub remaining_amount: Money,
    pub is_payment_complete: bool,
    pub is_insufficient: bool,
    pub payment_error: Option<String>,
    pub payment_reference: Option<String>,
}

/// Poll view of a settlement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementStatus {
    pub settlement_id: SettlementId,
    pub rider_id: RiderId,
    pub settlement_date: NaiveDate,
    pub status: ObligationStatus,
    pub expected_amount: Money,
    pub amount_paid: Money,
    pub remaining_amount: Money,
    pub is_settlement_complete: bool,
    pub is_insufficient: bool,
    pub payment_reference: Option<String>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl SettlementStatus {
    fn project(s: &SettlementObligation) -> Result<Self, PaymentError> {
        Ok(Self {
            settlement_id: s.id,
            rider_id: s.rider_id,
            settlement_date: s.settlement_date,
            status: s.status,
            expected_amount: s.amount_expected,
            amount_paid: s.amount_paid,
            remaining_amount: s.remaining()?,
            is_settlement_complete: s.status == ObligationStatus::Confirmed,
            is_insufficient: s.is_insufficient(),
            payment_reference: s.payment_reference.clone(),
            settled_at: s.settled_at,
        })
    }
}

/// How a settlement is looked up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementLookup {
    ById(SettlementId),
    ByRiderDate(RiderId, NaiveDate),
}

/// Payment initiation and status queries
#[derive(Clone)]
pub struct PaymentDesk {
    store: Arc<dyn ObligationStore>,
    static_qr_image_url: String,
}

impl PaymentDesk {
    pub fn new(store: Arc<dyn ObligationStore>, static_qr_image_url: impl Into<String>) -> Self {
        Self {
            store,
            static_qr_image_url: static_qr_image_url.into(),
        }
    }

    /// Pre-provisioned QR image customers and riders pay against
    pub fn static_qr_image_url(&self) -> &str {
        &self.static_qr_image_url
    }

    /// Opens the rider's settlement for `date`
    #[instrument(skip(self), fields(rider_id = %rider_id, date = %date, amount = %amount))]
    pub async fn initiate_settlement(
        &self,
        rider_id: RiderId,
        date: NaiveDate,
        amount: Money,
    ) -> Result<SettlementInitiation, PaymentError> {
        if !amount.is_positive() {
            return Err(PaymentError::validation("settlement amount must be positive"));
        }
        let init = SettlementInit {
            rider_id,
            settlement_date: date,
            amount,
            payment_reference: human_reference("SET"),
            at: Utc::now(),
        };
        match self.store.open_settlement(init).await? {
            WriteOutcome::Applied(settlement) => {
                info!(settlement_id = %settlement.id, reference = ?settlement.payment_reference, "settlement initiated");
                Ok(SettlementInitiation {
                    settlement,
                    static_qr_image_url: self.static_qr_image_url.clone(),
                })
            }
            WriteOutcome::PreconditionFailed => Err(PaymentError::SettlementAlreadyCompleted),
        }
    }

    pub async fn order_payment_status(&self, order_id: OrderId) -> Result<OrderPaymentStatus, PaymentError> {
        let o = self
            .store
            .order_obligation(order_id)
            .await
            .map_err(PaymentError::from_lookup)?;
        Ok(OrderPaymentStatus {
            order_id: o.order_id,
            status: o.order_status,
            payment_method: o.payment_method,
            expected_amount: o.amount_expected,
            amount_paid: o.amount_paid,
            remaining_amount: o.remaining()?,
            is_payment_complete: o.status() == ObligationStatus::Confirmed,
            is_insufficient: o.is_insufficient(),
            payment_error: o.payment_error.clone(),
            payment_reference: o.payment_reference.clone(),
        })
    }

    pub async fn settlement_status(&self, lookup: SettlementLookup) -> Result<SettlementStatus, PaymentError> {
        let settlement = match lookup {
            SettlementLookup::ById(id) => self
                .store
                .get_settlement(id)
                .await
                .map_err(PaymentError::from_lookup)?,
            SettlementLookup::ByRiderDate(rider_id, date) => self
                .store
                .find_settlement(rider_id, date)
                .await?
                .ok_or_else(|| {
                    PaymentError::ObligationNotFound(format!("Settlement for {} on {}", rider_id, date))
                })?,
        };
        SettlementStatus::project(&settlement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::mock::MockObligationStore;
    use crate::ports::PaymentWrite;
    use crate::obligation::ObligationRef;
    use rust_decimal_macros::dec;

    fn desk(store: &MockObligationStore) -> PaymentDesk {
        PaymentDesk::new(Arc::new(store.clone()), "/static-qrph.png")
    }

    #[tokio::test]
    async fn test_initiate_settlement_opens_pending() {
        let store = MockObligationStore::new();
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();

        let init = desk(&store)
            .initiate_settlement(RiderId::new(), date, Money::php(dec!(950)))
            .await
            .unwrap();

        assert_eq!(init.settlement.status, ObligationStatus::Pending);
        assert!(init.settlement.amount_paid.is_zero());
        assert!(init.settlement.payment_reference.as_deref().unwrap().starts_with("SET-"));
        assert_eq!(init.static_qr_image_url, "/static-qrph.png");
    }

    #[tokio::test]
    async fn test_reinitiate_confirmed_settlement_is_rejected() {
        let store = MockObligationStore::new();
        let rider = RiderId::new();
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let desk = desk(&store);
        let init = desk.initiate_settlement(rider, date, Money::php(dec!(500))).await.unwrap();

        store
            .record_payment(PaymentWrite {
                target: ObligationRef::Settlement(init.settlement.id),
                expected_amount_paid: Money::php(dec!(0)),
                expected_last_event_id: None,
                amount_paid: Money::php(dec!(500)),
                confirm: true,
                payment_error: None,
                event_id: "evt_s".to_string(),
                at: Utc::now(),
                ledger: None,
            })
            .await
            .unwrap();

        let again = desk.initiate_settlement(rider, date, Money::php(dec!(500))).await;
        assert!(matches!(again, Err(PaymentError::SettlementAlreadyCompleted)));
    }

    #[tokio::test]
    async fn test_settlement_status_by_rider_and_date() {
        let store = MockObligationStore::new();
        let rider = RiderId::new();
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let desk = desk(&store);
        desk.initiate_settlement(rider, date, Money::php(dec!(500))).await.unwrap();

        let status = desk
            .settlement_status(SettlementLookup::ByRiderDate(rider, date))
            .await
            .unwrap();

        assert_eq!(status.remaining_amount.amount(), dec!(500));
        assert!(!status.is_settlement_complete);
        assert!(!status.is_insufficient);

        let missing = desk
            .settlement_status(SettlementLookup::ByRiderDate(RiderId::new(), date))
            .await;
        assert!(matches!(missing, Err(PaymentError::ObligationNotFound(_))));
    }

    #[tokio::test]
    async fn test_rejects_non_positive_amount() {
        let store = MockObligationStore::new();
        let result = desk(&store)
            .initiate_settlement(RiderId::new(), NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(), Money::php(dec!(0)))
            .await;
        assert!(matches!(result, Err(PaymentError::Validation(_))));
    }
}
