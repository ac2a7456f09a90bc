//! PostgreSQL Order Store
//!
//! Implements `domain_delivery::OrderStore` over [`OrderRepository`], with
//! the payment ledger read through [`PaymentTransactionRepository`].

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tracing::{debug, instrument};

use core_kernel::{DayWindow, DomainPort, HealthCheckResult, HealthCheckable, OrderId, PortError, RiderId, WriteOutcome};
use domain_delivery::{ConditionalOrderUpdate, Order, OrderQuery, OrderStore, PaymentTransaction};

use crate::error::DatabaseError;
use crate::repositories::{OrderRepository, OrderRow, PaymentTransactionRepository};

/// PostgreSQL-backed implementation of the OrderStore trait
#[derive(Debug, Clone)]
pub struct PostgresOrderStore {
    repository: OrderRepository,
    payments: PaymentTransactionRepository,
}

impl PostgresOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: OrderRepository::new(pool.clone()),
            payments: PaymentTransactionRepository::new(pool),
        }
    }

    pub fn repository(&self) -> &OrderRepository {
        &self.repository
    }
}

impl DomainPort for PostgresOrderStore {}

#[async_trait]
impl HealthCheckable for PostgresOrderStore {
    async fn health_check(&self) -> HealthCheckResult {
        super::ping(self.repository.pool(), "postgres-order-store").await
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    #[instrument(skip(self), fields(order_id = %id))]
    async fn get_order(&self, id: OrderId) -> Result<Order, PortError> {
        let row = self.repository.get_by_id(*id.as_uuid()).await?;
        Ok(Order::try_from(row)?)
    }

    #[instrument(skip(self, order), fields(order_id = %order.id))]
    async fn insert_order(&self, order: &Order) -> Result<(), PortError> {
        self.repository.insert(order).await?;
        debug!("order inserted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_orders(&self, query: &OrderQuery) -> Result<Vec<Order>, PortError> {
        let rows = self.repository.find(query).await?;
        rows_to_orders(rows)
    }

    #[instrument(skip(self, window), fields(rider_id = %rider_id, date = %window.date))]
    async fn completed_between(
        &self,
        rider_id: RiderId,
        window: DayWindow,
    ) -> Result<Vec<Order>, PortError> {
        let rows = self.repository.completed_between(*rider_id.as_uuid(), window).await?;
        rows_to_orders(rows)
    }

    #[instrument(skip(self, update), fields(order_id = %update.order_id))]
    async fn update_order(
        &self,
        update: ConditionalOrderUpdate,
    ) -> Result<WriteOutcome<Order>, PortError> {
        match self.repository.update_conditional(&update, Utc::now()).await? {
            Some(row) => Ok(WriteOutcome::Applied(Order::try_from(row)?)),
            None => {
                debug!("precondition failed");
                Ok(WriteOutcome::PreconditionFailed)
            }
        }
    }

    #[instrument(skip(self), fields(order_id = %order_id))]
    async fn payment_transactions(&self, order_id: OrderId) -> Result<Vec<PaymentTransaction>, PortError> {
        self.payments
            .for_order(*order_id.as_uuid())
            .await?
            .into_iter()
            .map(PaymentTransaction::try_from)
            .collect::<Result<Vec<_>, DatabaseError>>()
            .map_err(PortError::from)
    }
}

fn rows_to_orders(rows: Vec<OrderRow>) -> Result<Vec<Order>, PortError> {
    rows.into_iter()
        .map(Order::try_from)
        .collect::<Result<Vec<_>, DatabaseError>>()
        .map_err(PortError::from)
}
