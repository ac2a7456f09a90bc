//! Delivery application service
//!
//! Every rider action is one conditional write. When the write misses, the
//! service re-reads the order only to explain why: wrong rider, wrong
//! status, or a concurrent change between the two.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use core_kernel::{human_reference, Money, OrderId, PortError, RiderId, Timezone, WriteOutcome};

use crate::error::DeliveryError;
use crate::ledger::PaymentTransaction;
use crate::order::{NewOrder, Order, OrderStatus, PaymentMethod};
use crate::ports::{ConditionalOrderUpdate, OrderChanges, OrderQuery, OrderStore, RiderGuard};
use crate::summary::{summarize, DailySummary};
use crate::workflow::OrderAction;

/// Rider-asserted payment details for the direct confirmation path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    pub method: PaymentMethod,
    /// Free-text note, recorded for cash only
    pub cash_audit_note: Option<String>,
    /// Provider reference, recorded for QR only
    pub payment_reference: Option<String>,
}

/// Proof-of-delivery artifact captured at the door
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofOfDelivery {
    /// Blob URL, or the inline data URL when upload fell back
    pub photo_url: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Drives orders through the delivery workflow
#[derive(Clone)]
pub struct DeliveryService {
    orders: Arc<dyn OrderStore>,
}

impl DeliveryService {
    pub fn new(orders: Arc<dyn OrderStore>) -> Self {
        Self { orders }
    }

    pub fn store(&self) -> &Arc<dyn OrderStore> {
        &self.orders
    }

    /// Creates a new unassigned order
    #[instrument(skip(self, new), fields(cod_amount = %new.cod_amount))]
    pub async fn create_order(&self, new: NewOrder) -> Result<Order, DeliveryError> {
        let order = Order::create(new)?;
        self.orders.insert_order(&order).await?;
        info!(order_id = %order.id, order_number = %order.order_number, "order created");
        Ok(order)
    }

    pub async fn get_order(&self, order_id: OrderId) -> Result<Order, DeliveryError> {
        self.orders
            .get_order(order_id)
            .await
            .map_err(|e| not_found_as(order_id, e))
    }

    pub async fn list_orders(&self, query: &OrderQuery) -> Result<Vec<Order>, DeliveryError> {
        Ok(self.orders.find_orders(query).await?)
    }

    /// Atomically assigns an unclaimed order to `rider_id`
    ///
    /// Of two riders racing for the same order exactly one succeeds; the
    /// other gets [`DeliveryError::NotClaimable`].
    #[instrument(skip(self), fields(order_id = %order_id, rider_id = %rider_id))]
    pub async fn claim(&self, order_id: OrderId, rider_id: RiderId) -> Result<Order, DeliveryError> {
        let changes = OrderChanges {
            accepted_at: Some(Utc::now()),
            ..OrderChanges::status(OrderStatus::Accepted).assign(rider_id)
        };
        self.transition(order_id, OrderAction::Claim, RiderGuard::Unassigned, changes)
            .await
    }

    /// Checks the scanned barcode and marks the package picked up
    ///
    /// A mismatch leaves the order `accepted` so the rider can rescan.
    #[instrument(skip(self, scanned), fields(order_id = %order_id, rider_id = %rider_id))]
    pub async fn verify_pickup(
        &self,
        order_id: OrderId,
        rider_id: RiderId,
        scanned: &str,
    ) -> Result<Order, DeliveryError> {
        let order = self.get_order(order_id).await?;
        if !order.is_assigned_to(rider_id) {
            return Err(DeliveryError::NotAssigned(order_id));
        }
        if !OrderAction::VerifyPickup.can_apply_to(order.status) {
            return Err(DeliveryError::InvalidTransition {
                from: order.status,
                action: OrderAction::VerifyPickup.name(),
            });
        }
        if !order.barcode_matches(scanned) {
            warn!("scanned barcode does not match");
            return Err(DeliveryError::BarcodeMismatch);
        }

        let changes = OrderChanges {
            picked_up_at: Some(Utc::now()),
            ..OrderChanges::status(OrderStatus::PickedUp)
        };
        self.transition(
            order_id,
            OrderAction::VerifyPickup,
            RiderGuard::AssignedTo(rider_id),
            changes,
        )
        .await
    }

    #[instrument(skip(self), fields(order_id = %order_id, rider_id = %rider_id))]
    pub async fn start_delivering(
        &self,
        order_id: OrderId,
        rider_id: RiderId,
    ) -> Result<Order, DeliveryError> {
        self.transition(
            order_id,
            OrderAction::StartDelivering,
            RiderGuard::AssignedTo(rider_id),
            OrderChanges::status(OrderStatus::Delivering),
        )
        .await
    }

    /// Opens the order's QR payment obligation
    ///
    /// Resets `amount_paid` and issues a fresh reference. Re-initiating while
    /// still `payment_pending` is allowed; once paid it is rejected.
    #[instrument(skip(self), fields(order_id = %order_id, rider_id = %rider_id))]
    pub async fn initiate_qr_payment(
        &self,
        order_id: OrderId,
        rider_id: RiderId,
    ) -> Result<Order, DeliveryError> {
        let order = self.get_order(order_id).await?;
        let changes = OrderChanges {
            payment_method: Some(PaymentMethod::Qrph),
            payment_reference: Some(human_reference("ORD")),
            amount_paid: Some(Money::zero(order.currency())),
            payment_error: Some(None),
            ..OrderChanges::status(OrderStatus::PaymentPending)
        };
        let order = self
            .transition(
                order_id,
                OrderAction::InitiateQrPayment,
                RiderGuard::AssignedTo(rider_id),
                changes,
            )
            .await?;
        info!(payment_reference = ?order.payment_reference, "QR payment initiated");
        Ok(order)
    }

    /// Rider asserts payment was received without waiting for a webhook
    ///
    /// The order is marked fully paid and a ledger entry for the COD amount
    /// is written with the status change.
    #[instrument(skip(self, confirmation), fields(order_id = %order_id, rider_id = %rider_id, method = %confirmation.method))]
    pub async fn confirm_payment_direct(
        &self,
        order_id: OrderId,
        rider_id: RiderId,
        confirmation: PaymentConfirmation,
    ) -> Result<Order, DeliveryError> {
        let order = self.get_order(order_id).await?;
        let now = Utc::now();
        let amount_paid = if order.cod_amount.is_covered_by(&order.amount_paid)? {
            order.amount_paid
        } else {
            order.cod_amount
        };
        let payment_reference = match confirmation.method {
            PaymentMethod::Qrph => confirmation.payment_reference,
            PaymentMethod::Cash => None,
        };
        let changes = OrderChanges {
            payment_method: Some(confirmation.method),
            payment_confirmed_at: Some(now),
            amount_paid: Some(amount_paid),
            payment_error: Some(None),
            cash_audit_note: match confirmation.method {
                PaymentMethod::Cash => confirmation.cash_audit_note,
                PaymentMethod::Qrph => None,
            },
            payment_reference: payment_reference.clone(),
            ..OrderChanges::status(OrderStatus::PaymentConfirmed)
        };
        let entry = PaymentTransaction::rider_confirmed(
            &order,
            confirmation.method,
            payment_reference.or_else(|| order.payment_reference.clone()),
            now,
        );
        self.transition_recording(
            order_id,
            OrderAction::ConfirmPayment,
            RiderGuard::AssignedTo(rider_id),
            changes,
            Some(entry),
        )
        .await
    }

    /// Ledger entries for an order, oldest first
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn payment_transactions(&self, order_id: OrderId) -> Result<Vec<PaymentTransaction>, DeliveryError> {
        self.get_order(order_id).await?;
        Ok(self.orders.payment_transactions(order_id).await?)
    }

    /// Closes out a paid order with its proof of delivery
    #[instrument(skip(self, proof), fields(order_id = %order_id, rider_id = %rider_id))]
    pub async fn complete(
        &self,
        order_id: OrderId,
        rider_id: RiderId,
        proof: ProofOfDelivery,
    ) -> Result<Order, DeliveryError> {
        if proof.photo_url.trim().is_empty() {
            return Err(DeliveryError::InvalidProof(
                "a proof-of-delivery photo is required".to_string(),
            ));
        }
        let changes = OrderChanges {
            completed_at: Some(Utc::now()),
            pod_photo_url: Some(proof.photo_url),
            pod_latitude: proof.latitude,
            pod_longitude: proof.longitude,
            ..OrderChanges::status(OrderStatus::Completed)
        };
        self.transition(
            order_id,
            OrderAction::Complete,
            RiderGuard::AssignedTo(rider_id),
            changes,
        )
        .await
    }

    /// Admin-only cancellation, irreversible
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn cancel(&self, order_id: OrderId) -> Result<Order, DeliveryError> {
        self.transition(
            order_id,
            OrderAction::Cancel,
            RiderGuard::Any,
            OrderChanges::status(OrderStatus::Failed),
        )
        .await
    }

    /// Collection summary for one rider and business day
    #[instrument(skip(self, timezone), fields(rider_id = %rider_id, date = %date))]
    pub async fn daily_summary(
        &self,
        rider_id: RiderId,
        date: NaiveDate,
        timezone: &Timezone,
    ) -> Result<DailySummary, DeliveryError> {
        let window = timezone.day_window(date)?;
        let orders = self.orders.completed_between(rider_id, window).await?;
        Ok(summarize(rider_id, date, &orders)?)
    }

    async fn transition(
        &self,
        order_id: OrderId,
        action: OrderAction,
        rider: RiderGuard,
        changes: OrderChanges,
    ) -> Result<Order, DeliveryError> {
        self.transition_recording(order_id, action, rider, changes, None).await
    }

    async fn transition_recording(
        &self,
        order_id: OrderId,
        action: OrderAction,
        rider: RiderGuard,
        changes: OrderChanges,
        entry: Option<PaymentTransaction>,
    ) -> Result<Order, DeliveryError> {
        let mut update = ConditionalOrderUpdate::new(order_id)
            .expect_status(action.allowed_from())
            .expect_rider(rider)
            .with_changes(changes);
        if let Some(entry) = entry {
            update = update.record(entry);
        }

        match self.orders.update_order(update).await? {
            WriteOutcome::Applied(order) => {
                info!(status = %order.status, "order {}", action.name());
                Ok(order)
            }
            WriteOutcome::PreconditionFailed => Err(self.explain_rejection(order_id, action, rider).await),
        }
    }

    async fn explain_rejection(
        &self,
        order_id: OrderId,
        action: OrderAction,
        rider: RiderGuard,
    ) -> DeliveryError {
        let order = match self.get_order(order_id).await {
            Ok(order) => order,
            Err(e) => return e,
        };
        warn!(status = %order.status, "conditional write rejected");

        if action == OrderAction::Claim {
            if OrderAction::Claim.can_apply_to(order.status) && order.rider_id.is_none() {
                return DeliveryError::ConcurrentModification(order_id);
            }
            return DeliveryError::NotClaimable { status: order.status };
        }
        if !rider.matches(order.rider_id) {
            return DeliveryError::NotAssigned(order_id);
        }
        if action == OrderAction::InitiateQrPayment && order.status.is_paid() {
            return DeliveryError::PaymentAlreadyConfirmed;
        }
        if !action.can_apply_to(order.status) {
            return DeliveryError::InvalidTransition {
                from: order.status,
                action: action.name(),
            };
        }
        DeliveryError::ConcurrentModification(order_id)
    }
}

fn not_found_as(order_id: OrderId, error: PortError) -> DeliveryError {
    if error.is_not_found() {
        DeliveryError::OrderNotFound(order_id)
    } else {
        DeliveryError::Store(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::ContactPoint;
    use crate::ports::mock::MockOrderStore;
    use rust_decimal_macros::dec;

    fn new_order() -> NewOrder {
        let point = ContactPoint {
            address: "Ayala Ave".to_string(),
            contact_name: "Ben".to_string(),
            contact_phone: "09171234567".to_string(),
            latitude: Some(14.55),
            longitude: Some(121.02),
        };
        NewOrder {
            package_description: "Phone case".to_string(),
            cod_amount: Money::php(dec!(750)),
            barcode: "PKG-750".to_string(),
            pickup: point.clone(),
            delivery: point,
        }
    }

    async fn service_with_order() -> (DeliveryService, MockOrderStore, Order) {
        let store = MockOrderStore::new();
        let service = DeliveryService::new(Arc::new(store.clone()));
        let order = service.create_order(new_order()).await.unwrap();
        (service, store, order)
    }

    async fn delivering(service: &DeliveryService, order_id: OrderId, rider: RiderId) {
        service.claim(order_id, rider).await.unwrap();
        service.verify_pickup(order_id, rider, "pkg-750").await.unwrap();
        service.start_delivering(order_id, rider).await.unwrap();
    }

    #[tokio::test]
    async fn test_claim_assigns_rider() {
        let (service, _, order) = service_with_order().await;
        let rider = RiderId::new();

        let claimed = service.claim(order.id, rider).await.unwrap();

        assert_eq!(claimed.status, OrderStatus::Accepted);
        assert_eq!(claimed.rider_id, Some(rider));
        assert!(claimed.accepted_at.is_some());
    }

    #[tokio::test]
    async fn test_second_claim_is_rejected() {
        let (service, _, order) = service_with_order().await;
        service.claim(order.id, RiderId::new()).await.unwrap();

        let result = service.claim(order.id, RiderId::new()).await;

        assert!(matches!(
            result,
            Err(DeliveryError::NotClaimable { status: OrderStatus::Accepted })
        ));
    }

    #[tokio::test]
    async fn test_barcode_mismatch_keeps_order_accepted() {
        let (service, store, order) = service_with_order().await;
        let rider = RiderId::new();
        service.claim(order.id, rider).await.unwrap();

        let result = service.verify_pickup(order.id, rider, "PKG-999").await;
        assert!(matches!(result, Err(DeliveryError::BarcodeMismatch)));
        assert_eq!(store.get_order(order.id).await.unwrap().status, OrderStatus::Accepted);

        let rescanned = service.verify_pickup(order.id, rider, " pkg-750 ").await.unwrap();
        assert_eq!(rescanned.status, OrderStatus::PickedUp);
    }

    #[tokio::test]
    async fn test_other_rider_cannot_mutate() {
        let (service, _, order) = service_with_order().await;
        let owner = RiderId::new();
        service.claim(order.id, owner).await.unwrap();
        service.verify_pickup(order.id, owner, "PKG-750").await.unwrap();

        let result = service.start_delivering(order.id, RiderId::new()).await;

        assert!(matches!(result, Err(DeliveryError::NotAssigned(_))));
    }

    #[tokio::test]
    async fn test_cash_confirmation_records_note_only_for_cash() {
        let (service, _, order) = service_with_order().await;
        let rider = RiderId::new();
        delivering(&service, order.id, rider).await;

        let paid = service
            .confirm_payment_direct(
                order.id,
                rider,
                PaymentConfirmation {
                    method: PaymentMethod::Cash,
                    cash_audit_note: Some("exact change".to_string()),
                    payment_reference: Some("ignored".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(paid.status, OrderStatus::PaymentConfirmed);
        assert_eq!(paid.cash_audit_note.as_deref(), Some("exact change"));
        assert!(paid.payment_reference.is_none());
        assert!(paid.payment_confirmed_at.is_some());
        assert_eq!(paid.amount_paid, paid.cod_amount);

        let ledger = service.payment_transactions(order.id).await.unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].amount, paid.cod_amount);
        assert_eq!(ledger[0].payment_method, PaymentMethod::Cash);
        assert!(ledger[0].provider_reference.is_none());
    }

    #[tokio::test]
    async fn test_initiate_qr_payment_resets_accumulator() {
        let (service, _, order) = service_with_order().await;
        let rider = RiderId::new();
        delivering(&service, order.id, rider).await;

        let pending = service.initiate_qr_payment(order.id, rider).await.unwrap();

        assert_eq!(pending.status, OrderStatus::PaymentPending);
        assert_eq!(pending.payment_method, Some(PaymentMethod::Qrph));
        assert!(pending.amount_paid.is_zero());
        assert!(pending.payment_reference.as_deref().unwrap().starts_with("ORD-"));
    }

    #[tokio::test]
    async fn test_reinitiate_after_confirmation_is_rejected() {
        let (service, _, order) = service_with_order().await;
        let rider = RiderId::new();
        delivering(&service, order.id, rider).await;
        service
            .confirm_payment_direct(
                order.id,
                rider,
                PaymentConfirmation {
                    method: PaymentMethod::Qrph,
                    cash_audit_note: None,
                    payment_reference: Some("PRX-1".to_string()),
                },
            )
            .await
            .unwrap();

        let result = service.initiate_qr_payment(order.id, rider).await;

        assert!(matches!(result, Err(DeliveryError::PaymentAlreadyConfirmed)));
    }

    #[tokio::test]
    async fn test_complete_requires_payment_and_photo() {
        let (service, _, order) = service_with_order().await;
        let rider = RiderId::new();
        delivering(&service, order.id, rider).await;

        let proof = ProofOfDelivery {
            photo_url: "https://blob/pod.jpg".to_string(),
            latitude: Some(14.5),
            longitude: Some(121.0),
        };
        let early = service.complete(order.id, rider, proof.clone()).await;
        assert!(matches!(
            early,
            Err(DeliveryError::InvalidTransition { from: OrderStatus::Delivering, .. })
        ));

        let empty = ProofOfDelivery {
            photo_url: "  ".to_string(),
            ..proof.clone()
        };
        assert!(matches!(
            service.complete(order.id, rider, empty).await,
            Err(DeliveryError::InvalidProof(_))
        ));

        service
            .confirm_payment_direct(
                order.id,
                rider,
                PaymentConfirmation {
                    method: PaymentMethod::Cash,
                    cash_audit_note: None,
                    payment_reference: None,
                },
            )
            .await
            .unwrap();
        let done = service.complete(order.id, rider, proof).await.unwrap();
        assert_eq!(done.status, OrderStatus::Completed);
        assert_eq!(done.pod_photo_url.as_deref(), Some("https://blob/pod.jpg"));
    }

    #[tokio::test]
    async fn test_cancel_is_terminal() {
        let (service, _, order) = service_with_order().await;
        let cancelled = service.cancel(order.id).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Failed);

        let again = service.cancel(order.id).await;
        assert!(matches!(again, Err(DeliveryError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn test_unknown_order_is_not_found() {
        let (service, _, _) = service_with_order().await;
        let result = service.claim(OrderId::new(), RiderId::new()).await;
        assert!(matches!(result, Err(DeliveryError::OrderNotFound(_))));
    }

    #[tokio::test]
    async fn test_store_failure_is_retryable() {
        let (service, store, order) = service_with_order().await;
        store.fail_next(1);
        let err = service.claim(order.id, RiderId::new()).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
