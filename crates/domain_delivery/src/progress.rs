//! Workflow progress resumption
//!
//! The rider app persists the screen it was on per order. On resume the
//! saved step is reconciled against the authoritative order status and the
//! further-advanced of the two wins, so the visible step never regresses.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use core_kernel::{OrderId, PortError};

use crate::order::{Order, OrderStatus};

/// Rider-facing delivery steps, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStep {
    EnRoutePickup,
    AtPickup,
    Delivering,
    Payment,
    Proof,
    Completed,
}

impl DeliveryStep {
    /// Earliest step consistent with a server-side status
    ///
    /// `None` for orders the rider has no workflow for (unclaimed or cancelled).
    pub fn for_status(status: OrderStatus) -> Option<DeliveryStep> {
        match status {
            OrderStatus::Pending | OrderStatus::Failed => None,
            OrderStatus::Accepted => Some(DeliveryStep::EnRoutePickup),
            OrderStatus::PickedUp | OrderStatus::Arrived | OrderStatus::Delivering => {
                Some(DeliveryStep::Delivering)
            }
            OrderStatus::PaymentPending => Some(DeliveryStep::Payment),
            OrderStatus::PaymentConfirmed => Some(DeliveryStep::Proof),
            OrderStatus::Completed => Some(DeliveryStep::Completed),
        }
    }
}

/// Reconciles a saved step with the order status
pub fn resume(saved: Option<DeliveryStep>, status: OrderStatus) -> Option<DeliveryStep> {
    let server = DeliveryStep::for_status(status)?;
    Some(saved.map_or(server, |saved| saved.max(server)))
}

/// Port for per-order step persistence
#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn load(&self, order_id: OrderId) -> Result<Option<DeliveryStep>, PortError>;
    async fn save(&self, order_id: OrderId, step: DeliveryStep) -> Result<(), PortError>;
    async fn clear(&self, order_id: OrderId) -> Result<(), PortError>;
}

/// Persists and reconciles workflow progress
#[derive(Clone)]
pub struct ProgressTracker {
    store: Arc<dyn ProgressStore>,
}

impl ProgressTracker {
    pub fn new(store: Arc<dyn ProgressStore>) -> Self {
        Self { store }
    }

    /// Step to show for `order`, persisting the reconciled value
    pub async fn resume(&self, order: &Order) -> Result<Option<DeliveryStep>, PortError> {
        let saved = self.store.load(order.id).await?;
        let step = resume(saved, order.status);
        debug!(order_id = %order.id, ?saved, ?step, "resuming delivery");

        match step {
            None | Some(DeliveryStep::Completed) => self.store.clear(order.id).await?,
            Some(step) if Some(step) != saved => self.store.save(order.id, step).await?,
            Some(_) => {}
        }
        Ok(step)
    }

    /// Records that the rider reached `step`; never moves backwards
    pub async fn advance(&self, order_id: OrderId, step: DeliveryStep) -> Result<DeliveryStep, PortError> {
        if step == DeliveryStep::Completed {
            self.store.clear(order_id).await?;
            return Ok(step);
        }
        let saved = self.store.load(order_id).await?;
        let next = saved.map_or(step, |saved| saved.max(step));
        if Some(next) != saved {
            self.store.save(order_id, next).await?;
        }
        Ok(next)
    }
}

#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use tokio::sync::RwLock;

    /// In-memory progress store
    #[derive(Debug, Default)]
    pub struct MemoryProgressStore {
        steps: RwLock<HashMap<OrderId, DeliveryStep>>,
    }

    impl MemoryProgressStore {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl ProgressStore for MemoryProgressStore {
        async fn load(&self, order_id: OrderId) -> Result<Option<DeliveryStep>, PortError> {
            Ok(self.steps.read().await.get(&order_id).copied())
        }

        async fn save(&self, order_id: OrderId, step: DeliveryStep) -> Result<(), PortError> {
            self.steps.write().await.insert(order_id, step);
            Ok(())
        }

        async fn clear(&self, order_id: OrderId) -> Result<(), PortError> {
            self.steps.write().await.remove(&order_id);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MemoryProgressStore;
    use super::*;

    #[test]
    fn test_step_mapping() {
        assert_eq!(DeliveryStep::for_status(OrderStatus::Accepted), Some(DeliveryStep::EnRoutePickup));
        assert_eq!(DeliveryStep::for_status(OrderStatus::PickedUp), Some(DeliveryStep::Delivering));
        assert_eq!(DeliveryStep::for_status(OrderStatus::PaymentPending), Some(DeliveryStep::Payment));
        assert_eq!(DeliveryStep::for_status(OrderStatus::PaymentConfirmed), Some(DeliveryStep::Proof));
        assert_eq!(DeliveryStep::for_status(OrderStatus::Failed), None);
    }

    #[test]
    fn test_resume_never_regresses() {
        // saved step ahead of the server (rider already at the pickup counter)
        assert_eq!(
            resume(Some(DeliveryStep::AtPickup), OrderStatus::Accepted),
            Some(DeliveryStep::AtPickup)
        );
        // server ahead of the saved step (webhook confirmed payment meanwhile)
        assert_eq!(
            resume(Some(DeliveryStep::Payment), OrderStatus::PaymentConfirmed),
            Some(DeliveryStep::Proof)
        );
        assert_eq!(resume(None, OrderStatus::Delivering), Some(DeliveryStep::Delivering));
    }

    #[test]
    fn test_resume_cancelled_order_has_no_step() {
        assert_eq!(resume(Some(DeliveryStep::Proof), OrderStatus::Failed), None);
    }

    #[tokio::test]
    async fn test_advance_ignores_backwards_moves() {
        let tracker = ProgressTracker::new(std::sync::Arc::new(MemoryProgressStore::new()));
        let order_id = OrderId::new();

        assert_eq!(tracker.advance(order_id, DeliveryStep::Payment).await.unwrap(), DeliveryStep::Payment);
        assert_eq!(
            tracker.advance(order_id, DeliveryStep::AtPickup).await.unwrap(),
            DeliveryStep::Payment
        );
    }
}
