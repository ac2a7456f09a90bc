//! Delivery domain errors

use thiserror::Error;

use core_kernel::{MoneyError, OrderId, PortError, TemporalError};

use crate::order::OrderStatus;

/// Errors that can occur in the delivery domain
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("Order is no longer available to claim (status: {status})")]
    NotClaimable { status: OrderStatus },

    #[error("Order {0} is not assigned to this rider")]
    NotAssigned(OrderId),

    #[error("Cannot {action} an order in status {from}")]
    InvalidTransition { from: OrderStatus, action: &'static str },

    #[error("Payment for this order is already confirmed")]
    PaymentAlreadyConfirmed,

    #[error("Barcode does not match this order")]
    BarcodeMismatch,

    #[error("Order {0} was modified concurrently")]
    ConcurrentModification(OrderId),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid proof of delivery: {0}")]
    InvalidProof(String),

    #[error(transparent)]
    Money(#[from] MoneyError),

    #[error(transparent)]
    Temporal(#[from] TemporalError),

    #[error("Store error: {0}")]
    Store(#[from] PortError),
}

impl DeliveryError {
    pub fn validation(message: impl Into<String>) -> Self {
        DeliveryError::Validation(message.into())
    }

    /// True when repeating the same request later may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, DeliveryError::Store(e) if e.is_transient())
    }
}
