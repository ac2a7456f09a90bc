//! Idempotency Guard
//!
//! Each obligation remembers the last event id that mutated it. An event
//! whose id equals that token has already been applied and must be skipped.
//!
//! The check alone is not enough: the accumulator writes the new token in the
//! same conditional write as the amount, with the previously read token as
//! part of the precondition, so a redelivery racing the first delivery loses
//! the write instead of double counting.
//!
//! Events with a generated id (see [`crate::PaymentEvent::id_generated`]) get
//! a fresh id on every delivery and are therefore never deduplicated.

use crate::obligation::Obligation;

/// True iff `event_id` is the token last written to `obligation`
pub fn should_skip<O: Obligation + ?Sized>(obligation: &O, event_id: &str) -> bool {
    obligation.last_webhook_event_id() == Some(event_id)
}
