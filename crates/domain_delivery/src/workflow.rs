//! Order delivery state machine
//!
//! ```text
//! pending -> accepted -> picked_up -> delivering -> payment_pending -> payment_confirmed -> completed
//!                                                \________________________/
//!                                                   (cash / direct QR)
//! any non-terminal state -> failed   (admin cancel)
//! ```
//!
//! The table here only answers "may this action run from that status". The
//! store enforces the same answer atomically through the precondition on
//! each conditional write.

use serde::{Deserialize, Serialize};

use crate::order::OrderStatus;

/// A state-changing action on an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderAction {
    Claim,
    VerifyPickup,
    StartDelivering,
    InitiateQrPayment,
    ConfirmPayment,
    /// Applied by the reconciliation engine when the QR obligation is satisfied
    ConfirmQrPayment,
    Complete,
    Cancel,
}

impl OrderAction {
    /// Statuses the order must be in for this action to apply
    pub fn allowed_from(&self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            OrderAction::Claim => &[Pending],
            OrderAction::VerifyPickup => &[Accepted],
            OrderAction::StartDelivering => &[PickedUp, Arrived],
            OrderAction::InitiateQrPayment => &[Delivering, PaymentPending],
            OrderAction::ConfirmPayment => &[Delivering, PaymentPending],
            OrderAction::ConfirmQrPayment => &[PaymentPending],
            OrderAction::Complete => &[PaymentConfirmed],
            OrderAction::Cancel => &[
                Pending,
                Accepted,
                PickedUp,
                Arrived,
                Delivering,
                PaymentPending,
                PaymentConfirmed,
            ],
        }
    }

    /// Status the order lands in
    pub fn target(&self) -> OrderStatus {
        match self {
            OrderAction::Claim => OrderStatus::Accepted,
            OrderAction::VerifyPickup => OrderStatus::PickedUp,
            OrderAction::StartDelivering => OrderStatus::Delivering,
            OrderAction::InitiateQrPayment => OrderStatus::PaymentPending,
            OrderAction::ConfirmPayment | OrderAction::ConfirmQrPayment => {
                OrderStatus::PaymentConfirmed
            }
            OrderAction::Complete => OrderStatus::Completed,
            OrderAction::Cancel => OrderStatus::Failed,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OrderAction::Claim => "claim",
            OrderAction::VerifyPickup => "pick up",
            OrderAction::StartDelivering => "start delivering",
            OrderAction::InitiateQrPayment => "initiate QR payment for",
            OrderAction::ConfirmPayment => "confirm payment for",
            OrderAction::ConfirmQrPayment => "confirm QR payment for",
            OrderAction::Complete => "complete",
            OrderAction::Cancel => "cancel",
        }
    }

    /// Rider-scoped actions must be performed by the assigned rider
    pub fn is_rider_scoped(&self) -> bool {
        !matches!(
            self,
            OrderAction::Claim | OrderAction::Cancel | OrderAction::ConfirmQrPayment
        )
    }

    pub fn can_apply_to(&self, status: OrderStatus) -> bool {
        self.allowed_from().contains(&status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_is_linear() {
        let mut status = OrderStatus::Pending;
        for action in [
            OrderAction::Claim,
            OrderAction::VerifyPickup,
            OrderAction::StartDelivering,
            OrderAction::InitiateQrPayment,
            OrderAction::ConfirmQrPayment,
            OrderAction::Complete,
        ] {
            assert!(action.can_apply_to(status), "{:?} from {}", action, status);
            status = action.target();
        }
        assert_eq!(status, OrderStatus::Completed);
    }

    #[test]
    fn test_cash_path_skips_payment_pending() {
        assert!(OrderAction::ConfirmPayment.can_apply_to(OrderStatus::Delivering));
        assert_eq!(OrderAction::ConfirmPayment.target(), OrderStatus::PaymentConfirmed);
    }

    #[test]
    fn test_no_backward_transitions() {
        assert!(!OrderAction::Claim.can_apply_to(OrderStatus::Accepted));
        assert!(!OrderAction::VerifyPickup.can_apply_to(OrderStatus::Delivering));
        assert!(!OrderAction::InitiateQrPayment.can_apply_to(OrderStatus::PaymentConfirmed));
        assert!(!OrderAction::Complete.can_apply_to(OrderStatus::PaymentPending));
    }

    #[test]
    fn test_cancel_from_any_non_terminal() {
        for status in OrderStatus::ALL {
            assert_eq!(OrderAction::Cancel.can_apply_to(status), !status.is_terminal());
        }
    }
}
