//! Custom Test Assertions
//!
//! Assertion helpers for domain types with more useful failure messages.

use core_kernel::Money;
use domain_delivery::{DeliveryError, Order, OrderStatus};
use rust_decimal::Decimal;

/// Asserts that a Money value has exactly `expected` major units
pub fn assert_money_eq(actual: &Money, expected: Decimal) {
    assert_eq!(
        actual.amount(),
        expected,
        "Money mismatch: actual={}, expected={}",
        actual,
        expected
    );
}

pub fn assert_money_zero(money: &Money) {
    assert!(money.is_zero(), "Expected zero money, got {}", money);
}

/// Asserts an order's status with the order number in the message
pub fn assert_order_status(order: &Order, expected: OrderStatus) {
    assert_eq!(
        order.status, expected,
        "Order {} has status {}, expected {}",
        order.order_number, order.status, expected
    );
}

/// Asserts that a rider action was rejected as not claimable
pub fn assert_not_claimable<T: std::fmt::Debug>(result: &Result<T, DeliveryError>) {
    assert!(
        matches!(result, Err(DeliveryError::NotClaimable { .. })),
        "Expected NotClaimable, got {:?}",
        result
    );
}
