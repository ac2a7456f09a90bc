//! Property-Based Test Generators
//!
//! Proptest strategies for payment sequences and identifiers.

use core_kernel::{Currency, Money};
use proptest::prelude::*;

/// Positive peso amounts in centavos, up to ₱100,000
pub fn positive_minor_strategy() -> impl Strategy<Value = i64> {
    1i64..10_000_000i64
}

/// A positive PHP amount with centavo precision
pub fn php_strategy() -> impl Strategy<Value = Money> {
    positive_minor_strategy().prop_map(|minor| Money::from_minor(minor, Currency::PHP))
}

/// Provider-style event id
pub fn event_id_strategy() -> impl Strategy<Value = String> {
    "evt_[a-z0-9]{8,16}"
}

/// A sequence of webhook deliveries: `(event_id, minor amount)`, with
/// some ids repeated to model redelivery
pub fn delivery_sequence_strategy() -> impl Strategy<Value = Vec<(String, i64)>> {
    prop::collection::vec((0usize..4, 1i64..50_000i64), 1..12).prop_map(|picks| {
        picks
            .into_iter()
            .map(|(slot, minor)| (format!("evt_{}", slot), minor))
            .collect()
    })
}
