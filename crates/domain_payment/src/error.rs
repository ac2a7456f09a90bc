//! Payment domain errors

use thiserror::Error;

use core_kernel::{MoneyError, PortError};

/// Why a raw webhook could not be turned into a [`crate::PaymentEvent`]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizationError {
    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Malformed payload: {0}")]
    BadPayload(String),

    #[error("Payload carries no payment amount")]
    MissingAmount,

    #[error("Invalid payment amount: {0}")]
    InvalidAmount(String),
}

/// Errors that can occur in the payment domain
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error(transparent)]
    Normalization(#[from] NormalizationError),

    #[error("Obligation not found: {0}")]
    ObligationNotFound(String),

    #[error("Settlement already completed for this date")]
    SettlementAlreadyCompleted,

    /// Another writer changed the obligation between read and write
    #[error("Obligation {0} changed concurrently, retry")]
    ConcurrentUpdate(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Money(#[from] MoneyError),

    #[error("Store error: {0}")]
    Store(#[from] PortError),
}

impl PaymentError {
    pub fn validation(message: impl Into<String>) -> Self {
        PaymentError::Validation(message.into())
    }

    /// True when the provider should redeliver the event
    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::Store(e) => e.is_transient(),
            PaymentError::ConcurrentUpdate(_) => true,
            _ => false,
        }
    }

    pub(crate) fn from_lookup(error: PortError) -> Self {
        match error {
            PortError::NotFound { entity_type, id } => {
                PaymentError::ObligationNotFound(format!("{} {}", entity_type, id))
            }
            other => PaymentError::Store(other),
        }
    }
}
