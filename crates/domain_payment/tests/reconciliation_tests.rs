//! Reconciliation pipeline tests over the shared mock order table

use std::sync::Arc;

use core_kernel::{Currency, Money, RiderId};
use domain_delivery::ports::mock::MockOrderStore;
use domain_delivery::{ConfirmationSource, DeliveryService, OrderStatus, PaymentConfirmation, PaymentMethod};
use domain_payment::ports::mock::MockObligationStore;
use domain_payment::{
    ApplyOutcome, Obligation, ObligationRef, ObligationStatus, ObligationStore, PaymentDesk, ReconcileOutcome,
    Reconciler, SettlementLookup, SignatureVerifier,
};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use test_utils::{
    assert_money_eq, delivery_sequence_strategy, MoneyFixtures, OrderBuilder, OrderFixtures, SettlementBuilder,
    TemporalFixtures, WebhookFixtures,
};

struct Harness {
    obligations: MockObligationStore,
    delivery: DeliveryService,
    reconciler: Reconciler,
}

impl Harness {
    fn new() -> Self {
        let orders = MockOrderStore::new();
        let obligations = MockObligationStore::with_order_store(&orders);
        Self {
            delivery: DeliveryService::new(Arc::new(orders.clone())),
            reconciler: Reconciler::new(
                Arc::new(obligations.clone()),
                SignatureVerifier::new(Some(WebhookFixtures::SECRET.to_string())),
                Currency::PHP,
            ),
            obligations,
        }
    }

    async fn deliver(&self, event_id: &str, minor: i64) -> ReconcileOutcome {
        let body = WebhookFixtures::body(event_id, minor);
        let signature = WebhookFixtures::signature(&body);
        self.reconciler
            .handle(&body, Some(&signature))
            .await
            .expect("webhook handled")
            .outcome
    }
}

fn applied(outcome: ReconcileOutcome) -> domain_payment::ApplyResult {
    match outcome {
        ReconcileOutcome::Applied(result) => result,
        ReconcileOutcome::Unattributed => panic!("event was not attributed"),
    }
}

#[tokio::test]
async fn test_qr_delivery_confirmed_by_webhook() {
    let h = Harness::new();
    let rider = RiderId::new();
    let order = h
        .delivery
        .create_order(OrderFixtures::new_order(MoneyFixtures::cod_750()))
        .await
        .unwrap();
    h.delivery.claim(order.id, rider).await.unwrap();
    h.delivery.verify_pickup(order.id, rider, OrderFixtures::BARCODE).await.unwrap();
    h.delivery.start_delivering(order.id, rider).await.unwrap();
    h.delivery.initiate_qr_payment(order.id, rider).await.unwrap();

    let first = applied(h.deliver("evt_1", 75000).await);
    assert_eq!(first.outcome, ApplyOutcome::Confirmed);
    assert_eq!(first.status_label(), "payment_confirmed");

    let replay = applied(h.deliver("evt_1", 75000).await);
    assert_eq!(replay.outcome, ApplyOutcome::Duplicate);

    let order = h.delivery.get_order(order.id).await.unwrap();
    assert_eq!(order.status, OrderStatus::PaymentConfirmed);
    assert_eq!(order.payment_method, Some(PaymentMethod::Qrph));
    assert_money_eq(&order.amount_paid, dec!(750));
    assert_eq!(order.last_webhook_event_id.as_deref(), Some("evt_1"));

    let ledger = h.delivery.payment_transactions(order.id).await.unwrap();
    assert_eq!(ledger.len(), 1, "replay must not add a second ledger entry");
    assert_eq!(ledger[0].source, ConfirmationSource::Webhook);
    assert_eq!(ledger[0].payment_method, PaymentMethod::Qrph);
    assert_eq!(ledger[0].webhook_event_id.as_deref(), Some("evt_1"));
    assert_eq!(ledger[0].provider_reference, order.payment_reference);
    assert_money_eq(&ledger[0].amount, dec!(750));
}

#[tokio::test]
async fn test_partial_webhook_leaves_no_ledger_entry_until_confirmed() {
    let h = Harness::new();
    let rider = RiderId::new();
    let order = OrderBuilder::new().awaiting_qr(rider).build();
    let order_id = order.id;
    h.obligations.insert_order(order).await;

    applied(h.deliver("evt_a", 50000).await);
    assert!(h.delivery.payment_transactions(order_id).await.unwrap().is_empty());

    applied(h.deliver("evt_b", 25000).await);
    let ledger = h.delivery.payment_transactions(order_id).await.unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].webhook_event_id.as_deref(), Some("evt_b"));
    assert_money_eq(&ledger[0].amount, dec!(750));
}

#[tokio::test]
async fn test_cash_confirmation_records_ledger_and_full_payment() {
    let h = Harness::new();
    let rider = RiderId::new();
    let order = h
        .delivery
        .create_order(OrderFixtures::new_order(MoneyFixtures::cod_750()))
        .await
        .unwrap();
    h.delivery.claim(order.id, rider).await.unwrap();
    h.delivery.verify_pickup(order.id, rider, OrderFixtures::BARCODE).await.unwrap();
    h.delivery.start_delivering(order.id, rider).await.unwrap();

    let confirmed = h
        .delivery
        .confirm_payment_direct(
            order.id,
            rider,
            PaymentConfirmation {
                method: PaymentMethod::Cash,
                cash_audit_note: Some("exact change".to_string()),
                payment_reference: None,
            },
        )
        .await
        .unwrap();
    assert_money_eq(&confirmed.amount_paid, dec!(750));

    let status = PaymentDesk::new(Arc::new(h.obligations.clone()), "/static-qrph.png")
        .order_payment_status(order.id)
        .await
        .unwrap();
    assert!(status.is_payment_complete);
    assert_money_eq(&status.remaining_amount, dec!(0));

    let ledger = h.delivery.payment_transactions(order.id).await.unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].source, ConfirmationSource::Rider);
    assert_eq!(ledger[0].payment_method, PaymentMethod::Cash);
    assert_money_eq(&ledger[0].amount, dec!(750));
}

#[tokio::test]
async fn test_partial_payments_accumulate_to_confirmation() {
    let h = Harness::new();
    let rider = RiderId::new();
    let settlement = SettlementBuilder::new(rider, Money::php(dec!(500))).build();
    let id = settlement.id;
    h.obligations.insert_settlement(settlement).await;

    let short = applied(h.deliver("evt_a", 30000).await);
    assert_eq!(short.outcome, ApplyOutcome::Insufficient);
    assert_eq!(short.status_label(), "settlement_insufficient");
    assert_money_eq(&short.remaining, dec!(200));

    let rest = applied(h.deliver("evt_b", 20000).await);
    assert_eq!(rest.outcome, ApplyOutcome::Confirmed);

    let stored = h.obligations.get_settlement(id).await.unwrap();
    assert_eq!(stored.status, ObligationStatus::Confirmed);
    assert_money_eq(&stored.amount_paid, dec!(500));
    assert!(stored.settled_at.is_some());
}

#[tokio::test]
async fn test_settlement_takes_priority_over_order() {
    let h = Harness::new();
    let rider = RiderId::new();
    h.obligations
        .insert_order(OrderBuilder::new().awaiting_qr(rider).updated_ago(1).build())
        .await;
    let settlement = SettlementBuilder::new(rider, Money::php(dec!(950))).build();
    let settlement_id = settlement.id;
    h.obligations.insert_settlement(settlement).await;

    let result = applied(h.deliver("evt_1", 95000).await);

    assert_eq!(result.obligation, ObligationRef::Settlement(settlement_id));
    assert_eq!(result.status_label(), "settlement_confirmed");
}

#[tokio::test]
async fn test_late_event_after_confirmation_is_benign() {
    let h = Harness::new();
    let rider = RiderId::new();
    let order = OrderBuilder::new().awaiting_qr(rider).build();
    let order_id = order.id;
    h.obligations.insert_order(order).await;

    applied(h.deliver("evt_1", 75000).await);
    // no pending obligation remains, the second payment is unattributed
    assert_eq!(h.deliver("evt_2", 75000).await, ReconcileOutcome::Unattributed);

    let status = h.obligations.order_obligation(order_id).await.unwrap();
    assert_money_eq(&status.amount_paid, dec!(750));
}

#[tokio::test]
async fn test_settlement_initiation_round_trip() {
    let h = Harness::new();
    let desk = PaymentDesk::new(Arc::new(h.obligations.clone()), "/static-qrph.png");
    let rider = RiderId::new();
    let date = TemporalFixtures::business_date();

    desk.initiate_settlement(rider, date, Money::php(dec!(950))).await.unwrap();
    applied(h.deliver("evt_1", 50000).await);

    let status = desk
        .settlement_status(SettlementLookup::ByRiderDate(rider, date))
        .await
        .unwrap();
    assert!(status.is_insufficient);
    assert_money_eq(&status.remaining_amount, dec!(450));

    // reopening while pending starts over
    let reopened = desk.initiate_settlement(rider, date, Money::php(dec!(950))).await.unwrap();
    assert_money_eq(&reopened.settlement.amount_paid, dec!(0));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn redelivery_never_double_counts(sequence in delivery_sequence_strategy()) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        runtime.block_on(async {
            let h = Harness::new();
            let expected = Money::php(dec!(1_000_000));
            let settlement = SettlementBuilder::new(RiderId::new(), expected).build();
            let id = settlement.id;
            h.obligations.insert_settlement(settlement).await;

            let mut previous = Decimal::ZERO;
            let mut last_applied: Option<String> = None;
            let mut credited = Decimal::ZERO;
            for (event_id, minor) in &sequence {
                let result = applied(h.deliver(event_id, *minor).await);
                let paid = result.amount_paid.amount();
                prop_assert!(paid >= previous);
                if last_applied.as_deref() == Some(event_id.as_str()) {
                    prop_assert_eq!(result.outcome, ApplyOutcome::Duplicate);
                } else {
                    credited += Decimal::new(*minor, 2);
                    last_applied = Some(event_id.clone());
                }
                previous = paid;
            }

            let stored = h.obligations.get_settlement(id).await.unwrap();
            prop_assert_eq!(stored.amount_paid().amount(), credited);
            Ok(())
        })?;
    }
}
