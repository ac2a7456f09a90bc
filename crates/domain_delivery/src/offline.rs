//! Offline mutation queue
//!
//! While the rider is disconnected, workflow mutations are queued as intents
//! and replayed in order on reconnect through [`DeliveryService`], i.e. the
//! same conditional writes an online request uses. A stale intent whose
//! precondition no longer holds fails and is dropped instead of clobbering
//! newer state. Transient failures keep the intent (and every later intent
//! for the same order) queued for the next replay.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use core_kernel::{OrderId, PortError, QueuedActionId, RiderId};

use crate::error::DeliveryError;
use crate::order::{Order, PaymentMethod};
use crate::service::{DeliveryService, PaymentConfirmation, ProofOfDelivery};

/// A rider mutation captured while offline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MutationIntent {
    VerifyPickup {
        barcode: String,
    },
    StartDelivering,
    ConfirmPayment {
        method: PaymentMethod,
        cash_audit_note: Option<String>,
        payment_reference: Option<String>,
    },
    Complete {
        photo_url: String,
        latitude: Option<f64>,
        longitude: Option<f64>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedAction {
    pub id: QueuedActionId,
    pub order_id: OrderId,
    pub intent: MutationIntent,
    pub queued_at: DateTime<Utc>,
    pub attempts: u32,
}

/// A queued action removed during replay because it can never apply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DroppedAction {
    pub id: QueuedActionId,
    pub order_id: OrderId,
    pub reason: String,
}

/// Outcome of one replay pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplayReport {
    pub applied: Vec<QueuedActionId>,
    pub dropped: Vec<DroppedAction>,
    pub retained: Vec<QueuedActionId>,
}

/// Durable storage for the queue
#[async_trait]
pub trait QueueStorage: Send + Sync {
    async fn load(&self) -> Result<Vec<QueuedAction>, PortError>;
    async fn store(&self, actions: &[QueuedAction]) -> Result<(), PortError>;
}

/// A rider's queue of pending mutations
pub struct OfflineQueue {
    storage: Arc<dyn QueueStorage>,
    rider_id: RiderId,
    // serializes enqueue against replay
    guard: Mutex<()>,
}

impl OfflineQueue {
    pub fn new(storage: Arc<dyn QueueStorage>, rider_id: RiderId) -> Self {
        Self {
            storage,
            rider_id,
            guard: Mutex::new(()),
        }
    }

    pub async fn enqueue(&self, order_id: OrderId, intent: MutationIntent) -> Result<QueuedAction, PortError> {
        let _guard = self.guard.lock().await;
        let action = QueuedAction {
            id: QueuedActionId::new_v7(),
            order_id,
            intent,
            queued_at: Utc::now(),
            attempts: 0,
        };
        let mut actions = self.storage.load().await?;
        actions.push(action.clone());
        self.storage.store(&actions).await?;
        Ok(action)
    }

    pub async fn pending(&self) -> Result<Vec<QueuedAction>, PortError> {
        self.storage.load().await
    }

    /// Replays queued intents oldest first
    #[instrument(skip(self, service), fields(rider_id = %self.rider_id))]
    pub async fn replay(&self, service: &DeliveryService) -> Result<ReplayReport, PortError> {
        let _guard = self.guard.lock().await;
        let actions = self.storage.load().await?;
        let mut report = ReplayReport::default();
        let mut remaining = Vec::new();
        let mut blocked: HashSet<OrderId> = HashSet::new();

        for mut action in actions {
            if blocked.contains(&action.order_id) {
                report.retained.push(action.id);
                remaining.push(action);
                continue;
            }
            action.attempts += 1;
            match self.apply(service, &action).await {
                Ok(_) => report.applied.push(action.id),
                Err(e) if e.is_retryable() => {
                    warn!(action_id = %action.id, error = %e, "replay failed, keeping queued");
                    blocked.insert(action.order_id);
                    report.retained.push(action.id);
                    remaining.push(action);
                }
                Err(e) => {
                    warn!(action_id = %action.id, error = %e, "dropping stale queued action");
                    report.dropped.push(DroppedAction {
                        id: action.id,
                        order_id: action.order_id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        self.storage.store(&remaining).await?;
        info!(
            applied = report.applied.len(),
            dropped = report.dropped.len(),
            retained = report.retained.len(),
            "offline queue replayed"
        );
        Ok(report)
    }

    async fn apply(&self, service: &DeliveryService, action: &QueuedAction) -> Result<Order, DeliveryError> {
        let rider = self.rider_id;
        let order_id = action.order_id;
        match &action.intent {
            MutationIntent::VerifyPickup { barcode } => {
                service.verify_pickup(order_id, rider, barcode).await
            }
            MutationIntent::StartDelivering => service.start_delivering(order_id, rider).await,
            MutationIntent::ConfirmPayment {
                method,
                cash_audit_note,
                payment_reference,
            } => {
                service
                    .confirm_payment_direct(
                        order_id,
                        rider,
                        PaymentConfirmation {
                            method: *method,
                            cash_audit_note: cash_audit_note.clone(),
                            payment_reference: payment_reference.clone(),
                        },
                    )
                    .await
            }
            MutationIntent::Complete {
                photo_url,
                latitude,
                longitude,
            } => {
                service
                    .complete(
                        order_id,
                        rider,
                        ProofOfDelivery {
                            photo_url: photo_url.clone(),
                            latitude: *latitude,
                            longitude: *longitude,
                        },
                    )
                    .await
            }
        }
    }
}

#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;

    /// Queue storage that round-trips through JSON like the device store does
    #[derive(Debug, Default)]
    pub struct MemoryQueueStorage {
        json: Mutex<String>,
    }

    impl MemoryQueueStorage {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl QueueStorage for MemoryQueueStorage {
        async fn load(&self) -> Result<Vec<QueuedAction>, PortError> {
            let json = self.json.lock().await;
            if json.is_empty() {
                return Ok(Vec::new());
            }
            serde_json::from_str(&json).map_err(|e| PortError::transformation(e.to_string()))
        }

        async fn store(&self, actions: &[QueuedAction]) -> Result<(), PortError> {
            *self.json.lock().await =
                serde_json::to_string(actions).map_err(|e| PortError::transformation(e.to_string()))?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MemoryQueueStorage;
    use super::*;
    use crate::order::{ContactPoint, NewOrder, OrderStatus};
    use crate::ports::mock::MockOrderStore;
    use crate::ports::OrderStore;
    use core_kernel::Money;
    use rust_decimal_macros::dec;

    async fn claimed_order(service: &DeliveryService, rider: RiderId) -> Order {
        let point = ContactPoint {
            address: "EDSA".to_string(),
            contact_name: "Dee".to_string(),
            contact_phone: "0917".to_string(),
            latitude: None,
            longitude: None,
        };
        let order = service
            .create_order(NewOrder {
                package_description: "Laptop".to_string(),
                cod_amount: Money::php(dec!(1200)),
                barcode: "LAP-1".to_string(),
                pickup: point.clone(),
                delivery: point,
            })
            .await
            .unwrap();
        service.claim(order.id, rider).await.unwrap()
    }

    #[tokio::test]
    async fn test_replay_applies_in_order() {
        let store = MockOrderStore::new();
        let service = DeliveryService::new(Arc::new(store.clone()));
        let rider = RiderId::new();
        let order = claimed_order(&service, rider).await;
        let queue = OfflineQueue::new(Arc::new(MemoryQueueStorage::new()), rider);

        queue
            .enqueue(order.id, MutationIntent::VerifyPickup { barcode: "lap-1".to_string() })
            .await
            .unwrap();
        queue.enqueue(order.id, MutationIntent::StartDelivering).await.unwrap();

        let report = queue.replay(&service).await.unwrap();

        assert_eq!(report.applied.len(), 2);
        assert!(queue.pending().await.unwrap().is_empty());
        assert_eq!(store.get_order(order.id).await.unwrap().status, OrderStatus::Delivering);
    }

    #[tokio::test]
    async fn test_stale_intent_is_dropped_without_clobbering() {
        let store = MockOrderStore::new();
        let service = DeliveryService::new(Arc::new(store.clone()));
        let rider = RiderId::new();
        let order = claimed_order(&service, rider).await;
        let queue = OfflineQueue::new(Arc::new(MemoryQueueStorage::new()), rider);

        queue
            .enqueue(order.id, MutationIntent::VerifyPickup { barcode: "LAP-1".to_string() })
            .await
            .unwrap();
        // admin cancels while the rider is offline
        service.cancel(order.id).await.unwrap();

        let report = queue.replay(&service).await.unwrap();

        assert!(report.applied.is_empty());
        assert_eq!(report.dropped.len(), 1);
        assert_eq!(store.get_order(order.id).await.unwrap().status, OrderStatus::Failed);
    }

    #[tokio::test]
    async fn test_transient_failure_retains_later_actions_for_same_order() {
        let store = MockOrderStore::new();
        let service = DeliveryService::new(Arc::new(store.clone()));
        let rider = RiderId::new();
        let order = claimed_order(&service, rider).await;
        let queue = OfflineQueue::new(Arc::new(MemoryQueueStorage::new()), rider);

        queue
            .enqueue(order.id, MutationIntent::VerifyPickup { barcode: "LAP-1".to_string() })
            .await
            .unwrap();
        queue.enqueue(order.id, MutationIntent::StartDelivering).await.unwrap();

        store.fail_next(1);
        let first = queue.replay(&service).await.unwrap();
        assert_eq!(first.retained.len(), 2);
        assert_eq!(queue.pending().await.unwrap()[0].attempts, 1);

        let second = queue.replay(&service).await.unwrap();
        assert_eq!(second.applied.len(), 2);
        assert_eq!(store.get_order(order.id).await.unwrap().status, OrderStatus::Delivering);
    }
}
