//! Obligation Matcher
//!
//! Webhook events carry an amount but no reliable reference to what they
//! pay for. The matcher attributes them to the single most recent pending
//! obligation: the latest initiated pending settlement if there is one,
//! otherwise the most recently updated order in `payment_pending`.
//!
//! Known limitation: only one candidate is ever considered. If two riders
//! have QR payments pending at the same moment, a payment for the older one
//! is credited to the newer one. Matching on the payment reference issued
//! at initiation would remove the ambiguity once the provider echoes it
//! back in the webhook.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::error::PaymentError;
use crate::obligation::MatchedObligation;
use crate::ports::ObligationStore;

#[derive(Clone)]
pub struct ObligationMatcher {
    store: Arc<dyn ObligationStore>,
}

impl ObligationMatcher {
    pub fn new(store: Arc<dyn ObligationStore>) -> Self {
        Self { store }
    }

    /// `None` means the event is unattributed
    #[instrument(skip(self))]
    pub async fn find_match(&self) -> Result<Option<MatchedObligation>, PaymentError> {
        if let Some(settlement) = self.store.latest_pending_settlement().await? {
            debug!(settlement_id = %settlement.id, "matched pending settlement");
            return Ok(Some(MatchedObligation::Settlement(settlement)));
        }
        if let Some(order) = self.store.latest_pending_order().await? {
            debug!(order_id = %order.order_id, "matched pending order");
            return Ok(Some(MatchedObligation::Order(order)));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obligation::{ObligationStatus, SettlementObligation};
    use crate::ports::mock::MockObligationStore;
    use chrono::{Duration, Utc};
    use core_kernel::{Money, RiderId, SettlementId};

    fn settlement(status: ObligationStatus, minutes_ago: i64) -> SettlementObligation {
        let at = Utc::now() - Duration::minutes(minutes_ago);
        SettlementObligation {
            id: SettlementId::new(),
            rider_id: RiderId::new(),
            settlement_date: at.date_naive(),
            amount_expected: Money::php(500.into()),
            amount_paid: Money::php(0.into()),
            status,
            payment_reference: None,
            last_webhook_event_id: None,
            initiated_at: at,
            settled_at: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[tokio::test]
    async fn test_no_pending_is_unattributed() {
        let store = MockObligationStore::new();
        store.insert_settlement(settlement(ObligationStatus::Confirmed, 1)).await;
        let matcher = ObligationMatcher::new(Arc::new(store));

        assert!(matcher.find_match().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_picks_most_recent_pending_settlement() {
        let store = MockObligationStore::new();
        let older = settlement(ObligationStatus::Pending, 30);
        let newer = settlement(ObligationStatus::Pending, 5);
        store.insert_settlement(older).await;
        store.insert_settlement(newer.clone()).await;
        let matcher = ObligationMatcher::new(Arc::new(store));

        match matcher.find_match().await.unwrap() {
            Some(MatchedObligation::Settlement(s)) => assert_eq!(s.id, newer.id),
            other => panic!("expected settlement, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_store_failure_propagates_as_retryable() {
        let store = MockObligationStore::new();
        store.fail_next(1);
        let matcher = ObligationMatcher::new(Arc::new(store));

        let err = matcher.find_match().await.unwrap_err();
        assert!(err.is_retryable());
    }
}
