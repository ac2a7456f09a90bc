//! Settlement Accumulator
//!
//! ```text
//! pending --apply(amount)--> pending     paid + amount <  expected
//! pending --apply(amount)--> confirmed   paid + amount >= expected
//! ```
//!
//! Over-payment confirms and is recorded as paid, uncapped. `confirmed` is
//! terminal.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use core_kernel::{Money, MoneyError, RiderId, WriteOutcome};
use domain_delivery::PaymentTransaction;

use crate::error::PaymentError;
use crate::event::PaymentEvent;
use crate::idempotency::should_skip;
use crate::obligation::{MatchedObligation, Obligation, ObligationRef, ObligationStatus};
use crate::ports::{ObligationStore, PaymentWrite};

/// What applying an amount would do, computed from a snapshot
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyPlan {
    /// Event already applied
    Duplicate,
    /// Obligation was confirmed before this event arrived
    AlreadySettled,
    Confirm { total_paid: Money },
    Partial { total_paid: Money, remaining: Money },
}

/// Pure planning step of the accumulator
pub fn plan<O: Obligation + ?Sized>(
    obligation: &O,
    event_id: &str,
    amount: &Money,
) -> Result<ApplyPlan, MoneyError> {
    if should_skip(obligation, event_id) {
        return Ok(ApplyPlan::Duplicate);
    }
    if obligation.status() == ObligationStatus::Confirmed {
        return Ok(ApplyPlan::AlreadySettled);
    }
    let total_paid = obligation.amount_paid().checked_add(amount)?;
    if obligation.amount_expected().is_covered_by(&total_paid)? {
        Ok(ApplyPlan::Confirm { total_paid })
    } else {
        Ok(ApplyPlan::Partial {
            remaining: obligation.amount_expected().remaining_after(&total_paid)?,
            total_paid,
        })
    }
}

/// Message shown to the rider while a payment is short
pub fn shortfall_message(total_paid: &Money, remaining: &Money) -> String {
    format!(
        "Insufficient payment. Paid: {}, Need: {} more",
        total_paid, remaining
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyOutcome {
    Duplicate,
    Confirmed,
    Insufficient,
    /// A concurrent event confirmed the obligation first
    AlreadySettled,
}

/// Result of applying one event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyResult {
    pub obligation: ObligationRef,
    pub rider_id: Option<RiderId>,
    pub outcome: ApplyOutcome,
    pub amount_paid: Money,
    pub amount_expected: Money,
    pub remaining: Money,
}

impl ApplyResult {
    /// Status string reported to the provider
    pub fn status_label(&self) -> &'static str {
        let settlement = matches!(self.obligation, ObligationRef::Settlement(_));
        match (self.outcome, settlement) {
            (ApplyOutcome::Duplicate, _) => "duplicate",
            (ApplyOutcome::Confirmed | ApplyOutcome::AlreadySettled, false) => "payment_confirmed",
            (ApplyOutcome::Confirmed | ApplyOutcome::AlreadySettled, true) => "settlement_confirmed",
            (ApplyOutcome::Insufficient, false) => "insufficient",
            (ApplyOutcome::Insufficient, true) => "settlement_insufficient",
        }
    }

    pub fn new_status(&self) -> ObligationStatus {
        match self.outcome {
            ApplyOutcome::Insufficient => ObligationStatus::Pending,
            ApplyOutcome::Confirmed | ApplyOutcome::AlreadySettled => ObligationStatus::Confirmed,
            ApplyOutcome::Duplicate if self.remaining.is_zero() => ObligationStatus::Confirmed,
            ApplyOutcome::Duplicate => ObligationStatus::Pending,
        }
    }
}

/// Applies matched payment events to obligations
#[derive(Clone)]
pub struct Accumulator {
    store: Arc<dyn ObligationStore>,
}

impl Accumulator {
    pub fn new(store: Arc<dyn ObligationStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, obligation, event), fields(obligation = %obligation.obligation_ref(), event_id = %event.event_id))]
    pub async fn apply(
        &self,
        obligation: &MatchedObligation,
        event: &PaymentEvent,
    ) -> Result<ApplyResult, PaymentError> {
        let rider_id = obligation.rider_id();
        let result = |outcome, amount_paid: Money| -> Result<ApplyResult, PaymentError> {
            Ok(ApplyResult {
                obligation: obligation.obligation_ref(),
                rider_id,
                outcome,
                amount_paid,
                amount_expected: obligation.amount_expected(),
                remaining: obligation.amount_expected().remaining_after(&amount_paid)?,
            })
        };

        let (total_paid, confirm, payment_error) = match plan(obligation, &event.event_id, &event.amount)? {
            ApplyPlan::Duplicate => {
                info!("event already processed");
                return result(ApplyOutcome::Duplicate, obligation.amount_paid());
            }
            ApplyPlan::AlreadySettled => {
                info!("obligation already confirmed");
                return result(ApplyOutcome::AlreadySettled, obligation.amount_paid());
            }
            ApplyPlan::Confirm { total_paid } => (total_paid, true, None),
            ApplyPlan::Partial { total_paid, remaining } => {
                (total_paid, false, Some(shortfall_message(&total_paid, &remaining)))
            }
        };

        let at = Utc::now();
        let ledger = match obligation {
            MatchedObligation::Order(order) if confirm => Some(PaymentTransaction::webhook_confirmed(
                order.order_id,
                total_paid,
                order.payment_reference.clone(),
                event.event_id.clone(),
                at,
            )),
            _ => None,
        };
        let write = PaymentWrite {
            target: obligation.obligation_ref(),
            expected_amount_paid: obligation.amount_paid(),
            expected_last_event_id: obligation.last_webhook_event_id().map(str::to_string),
            amount_paid: total_paid,
            confirm,
            payment_error,
            event_id: event.event_id.clone(),
            at,
            ledger,
        };

        match self.store.record_payment(write).await? {
            WriteOutcome::Applied(()) => {
                let outcome = if confirm {
                    ApplyOutcome::Confirmed
                } else {
                    ApplyOutcome::Insufficient
                };
                info!(amount_paid = %total_paid, expected = %obligation.amount_expected(), ?outcome, "payment applied");
                result(outcome, total_paid)
            }
            WriteOutcome::PreconditionFailed => self.resolve_conflict(obligation, event).await,
        }
    }

    /// The conditional write missed; re-read to see who won
    async fn resolve_conflict(
        &self,
        obligation: &MatchedObligation,
        event: &PaymentEvent,
    ) -> Result<ApplyResult, PaymentError> {
        let current = self.reload(obligation.obligation_ref()).await?;
        let outcome = if should_skip(&current, &event.event_id) {
            ApplyOutcome::Duplicate
        } else if current.status() == ObligationStatus::Confirmed {
            ApplyOutcome::AlreadySettled
        } else {
            warn!("obligation changed between read and write");
            return Err(PaymentError::ConcurrentUpdate(obligation.obligation_ref().to_string()));
        };
        info!(?outcome, "conditional write lost to a concurrent writer");
        Ok(ApplyResult {
            obligation: current.obligation_ref(),
            rider_id: current.rider_id(),
            outcome,
            amount_paid: current.amount_paid(),
            amount_expected: current.amount_expected(),
            remaining: current.remaining()?,
        })
    }

    async fn reload(&self, target: ObligationRef) -> Result<MatchedObligation, PaymentError> {
        match target {
            ObligationRef::Order(id) => self
                .store
                .order_obligation(id)
                .await
                .map(MatchedObligation::Order)
                .map_err(PaymentError::from_lookup),
            ObligationRef::Settlement(id) => self
                .store
                .get_settlement(id)
                .await
                .map(MatchedObligation::Settlement)
                .map_err(PaymentError::from_lookup),
        }
    }
}
