//! PostgreSQL Obligation Store
//!
//! Implements `domain_payment::ObligationStore`. Order obligations read and
//! write the `orders` table through [`OrderRepository`]; settlements use
//! [`SettlementRepository`].

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use tracing::{debug, instrument};

use core_kernel::{DomainPort, HealthCheckResult, HealthCheckable, OrderId, PortError, RiderId, SettlementId, WriteOutcome};
use domain_delivery::Order;
use domain_payment::{
    MatchedObligation, ObligationRef, ObligationStore, OrderObligation, PaymentWrite, SettlementInit,
    SettlementObligation,
};

use crate::repositories::{OrderRepository, SettlementRepository};

/// PostgreSQL-backed implementation of the ObligationStore trait
#[derive(Debug, Clone)]
pub struct PostgresObligationStore {
    orders: OrderRepository,
    settlements: SettlementRepository,
}

impl PostgresObligationStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            orders: OrderRepository::new(pool.clone()),
            settlements: SettlementRepository::new(pool),
        }
    }
}

impl DomainPort for PostgresObligationStore {}

#[async_trait]
impl HealthCheckable for PostgresObligationStore {
    async fn health_check(&self) -> HealthCheckResult {
        super::ping(self.orders.pool(), "postgres-obligation-store").await
    }
}

#[async_trait]
impl ObligationStore for PostgresObligationStore {
    #[instrument(skip(self))]
    async fn latest_pending_settlement(&self) -> Result<Option<SettlementObligation>, PortError> {
        match self.settlements.latest_pending().await? {
            Some(row) => Ok(Some(SettlementObligation::try_from(row)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    async fn latest_pending_order(&self) -> Result<Option<OrderObligation>, PortError> {
        match self.orders.latest_payment_pending().await? {
            Some(row) => {
                let order = Order::try_from(row)?;
                Ok(Some(OrderObligation::from(&order)))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self), fields(order_id = %order_id))]
    async fn order_obligation(&self, order_id: OrderId) -> Result<OrderObligation, PortError> {
        let order = Order::try_from(self.orders.get_by_id(*order_id.as_uuid()).await?)?;
        Ok(OrderObligation::from(&order))
    }

    #[instrument(skip(self), fields(settlement_id = %id))]
    async fn get_settlement(&self, id: SettlementId) -> Result<SettlementObligation, PortError> {
        let row = self.settlements.get_by_id(*id.as_uuid()).await?;
        Ok(SettlementObligation::try_from(row)?)
    }

    #[instrument(skip(self), fields(rider_id = %rider_id, date = %date))]
    async fn find_settlement(
        &self,
        rider_id: RiderId,
        date: NaiveDate,
    ) -> Result<Option<SettlementObligation>, PortError> {
        match self.settlements.find_by_rider_date(*rider_id.as_uuid(), date).await? {
            Some(row) => Ok(Some(SettlementObligation::try_from(row)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    async fn find_by_event_id(&self, event_id: &str) -> Result<Option<MatchedObligation>, PortError> {
        if let Some(row) = self.settlements.find_by_event_id(event_id).await? {
            return Ok(Some(MatchedObligation::Settlement(SettlementObligation::try_from(row)?)));
        }
        match self.orders.find_by_event_id(event_id).await? {
            Some(row) => {
                let order = Order::try_from(row)?;
                Ok(Some(MatchedObligation::Order(OrderObligation::from(&order))))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self, init), fields(rider_id = %init.rider_id, date = %init.settlement_date))]
    async fn open_settlement(
        &self,
        init: SettlementInit,
    ) -> Result<WriteOutcome<SettlementObligation>, PortError> {
        match self.settlements.open(&init).await? {
            Some(row) => Ok(WriteOutcome::Applied(SettlementObligation::try_from(row)?)),
            None => {
                debug!("settlement already confirmed");
                Ok(WriteOutcome::PreconditionFailed)
            }
        }
    }

    #[instrument(skip(self, write), fields(obligation = %write.target, event_id = %write.event_id))]
    async fn record_payment(&self, write: PaymentWrite) -> Result<WriteOutcome<()>, PortError> {
        let applied = match write.target {
            ObligationRef::Order(order_id) => {
                self.orders
                    .record_payment(
                        *order_id.as_uuid(),
                        write.expected_amount_paid.amount(),
                        write.expected_last_event_id.as_deref(),
                        write.amount_paid.amount(),
                        write.confirm,
                        write.payment_error.as_deref(),
                        &write.event_id,
                        write.at,
                        write.ledger.as_ref(),
                    )
                    .await?
            }
            ObligationRef::Settlement(id) => {
                self.settlements
                    .record_payment(
                        *id.as_uuid(),
                        write.expected_amount_paid.amount(),
                        write.expected_last_event_id.as_deref(),
                        write.amount_paid.amount(),
                        write.confirm,
                        &write.event_id,
                        write.at,
                    )
                    .await?
            }
        };
        if applied {
            Ok(WriteOutcome::Applied(()))
        } else {
            debug!("precondition failed");
            Ok(WriteOutcome::PreconditionFailed)
        }
    }
}
