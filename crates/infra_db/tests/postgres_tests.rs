//! Conditional writes against a real PostgreSQL
//!
//! Uses `TEST_DATABASE_URL` or a testcontainers PostgreSQL; each test skips
//! when neither is available. Every test seeds its own riders and orders,
//! so the suite can share one database.

use chrono::Utc;
use rust_decimal_macros::dec;
use uuid::Uuid;

use core_kernel::{Money, OrderId, RiderId, WriteOutcome};
use domain_delivery::{
    ConditionalOrderUpdate, ConfirmationSource, Order, OrderChanges, OrderStatus, OrderStore, PaymentMethod,
    PaymentTransaction, RiderGuard,
};
use domain_payment::{ObligationRef, ObligationStatus, ObligationStore, PaymentWrite, SettlementInit};
use infra_db::{run_migrations, PostgresObligationStore, PostgresOrderStore};
use test_utils::{OrderBuilder, TemporalFixtures, TestDatabase};

struct Stores {
    _db: TestDatabase,
    orders: PostgresOrderStore,
    obligations: PostgresObligationStore,
}

async fn stores(test: &str) -> Option<Stores> {
    let db = TestDatabase::start_or_skip(test).await?;
    run_migrations(db.pool()).await.unwrap();
    Some(Stores {
        orders: PostgresOrderStore::new(db.pool().clone()),
        obligations: PostgresObligationStore::new(db.pool().clone()),
        _db: db,
    })
}

/// Seeds `order` under a collision-free order number
async fn seed(stores: &Stores, mut order: Order) -> OrderId {
    order.order_number = format!("ORD-{}", Uuid::new_v4().simple());
    stores.orders.insert_order(&order).await.unwrap();
    order.id
}

fn claim(order_id: OrderId, rider: RiderId) -> ConditionalOrderUpdate {
    ConditionalOrderUpdate::new(order_id)
        .expect_status(&[OrderStatus::Pending])
        .expect_rider(RiderGuard::Unassigned)
        .with_changes(OrderChanges::status(OrderStatus::Accepted).assign(rider))
}

fn payment(order_id: OrderId, expected: Money, last_event: Option<&str>, paid: Money, event_id: &str) -> PaymentWrite {
    PaymentWrite {
        target: ObligationRef::Order(order_id),
        expected_amount_paid: expected,
        expected_last_event_id: last_event.map(str::to_string),
        amount_paid: paid,
        confirm: false,
        payment_error: None,
        event_id: event_id.to_string(),
        at: Utc::now(),
        ledger: None,
    }
}

fn event_id(label: &str) -> String {
    format!("evt_{}_{}", label, Uuid::new_v4().simple())
}

#[tokio::test]
async fn test_two_riders_racing_for_one_order_one_wins() {
    let Some(stores) = stores("test_two_riders_racing_for_one_order_one_wins").await else {
        return;
    };
    let order_id = seed(&stores, OrderBuilder::new().build()).await;
    let (alice, bob) = (RiderId::new(), RiderId::new());

    let (a, b) = tokio::join!(
        stores.orders.update_order(claim(order_id, alice)),
        stores.orders.update_order(claim(order_id, bob)),
    );
    let outcomes = [a.unwrap(), b.unwrap()];

    let winners: Vec<&Order> = outcomes
        .iter()
        .filter_map(|outcome| match outcome {
            WriteOutcome::Applied(order) => Some(order),
            WriteOutcome::PreconditionFailed => None,
        })
        .collect();
    assert_eq!(winners.len(), 1);

    let stored = stores.orders.get_order(order_id).await.unwrap();
    assert_eq!(stored.status, OrderStatus::Accepted);
    assert_eq!(stored.rider_id, winners[0].rider_id);
}

#[tokio::test]
async fn test_stale_payment_writes_miss() {
    let Some(stores) = stores("test_stale_payment_writes_miss").await else {
        return;
    };
    let rider = RiderId::new();
    let order_id = seed(&stores, OrderBuilder::new().awaiting_qr(rider).build()).await;
    let first = event_id("first");

    let applied = stores
        .obligations
        .record_payment(PaymentWrite {
            payment_error: Some("Insufficient payment".to_string()),
            ..payment(order_id, Money::php(dec!(0)), None, Money::php(dec!(500)), &first)
        })
        .await
        .unwrap();
    assert!(applied.is_applied());

    // Read before the first write landed
    let stale_amount = stores
        .obligations
        .record_payment(payment(order_id, Money::php(dec!(0)), None, Money::php(dec!(250)), &event_id("late")))
        .await
        .unwrap();
    assert_eq!(stale_amount, WriteOutcome::PreconditionFailed);

    // Right amount, wrong last event
    let stale_event = stores
        .obligations
        .record_payment(payment(
            order_id,
            Money::php(dec!(500)),
            Some("evt_someone_else"),
            Money::php(dec!(750)),
            &event_id("other"),
        ))
        .await
        .unwrap();
    assert_eq!(stale_event, WriteOutcome::PreconditionFailed);

    let order = stores.orders.get_order(order_id).await.unwrap();
    assert_eq!(order.amount_paid, Money::php(dec!(500)));
    assert_eq!(order.last_webhook_event_id.as_deref(), Some(first.as_str()));
    assert_eq!(order.payment_error.as_deref(), Some("Insufficient payment"));
    assert_eq!(order.status, OrderStatus::PaymentPending);
}

#[tokio::test]
async fn test_confirming_webhook_write_records_ledger_atomically() {
    let Some(stores) = stores("test_confirming_webhook_write_records_ledger_atomically").await else {
        return;
    };
    let rider = RiderId::new();
    let order_id = seed(&stores, OrderBuilder::new().awaiting_qr(rider).build()).await;
    let confirming = event_id("full");
    let entry =
        || PaymentTransaction::webhook_confirmed(order_id, Money::php(dec!(750)), None, confirming.clone(), Utc::now());

    let applied = stores
        .obligations
        .record_payment(PaymentWrite {
            confirm: true,
            ledger: Some(entry()),
            ..payment(order_id, Money::php(dec!(0)), None, Money::php(dec!(750)), &confirming)
        })
        .await
        .unwrap();
    assert!(applied.is_applied());

    // A replayed confirmation finds the order confirmed and writes nothing
    let replay = stores
        .obligations
        .record_payment(PaymentWrite {
            confirm: true,
            ledger: Some(entry()),
            ..payment(order_id, Money::php(dec!(0)), None, Money::php(dec!(750)), &confirming)
        })
        .await
        .unwrap();
    assert_eq!(replay, WriteOutcome::PreconditionFailed);

    let order = stores.orders.get_order(order_id).await.unwrap();
    assert_eq!(order.status, OrderStatus::PaymentConfirmed);
    assert!(order.payment_confirmed_at.is_some());
    assert!(order.payment_error.is_none());

    let ledger = stores.orders.payment_transactions(order_id).await.unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].source, ConfirmationSource::Webhook);
    assert_eq!(ledger[0].payment_method, PaymentMethod::Qrph);
    assert_eq!(ledger[0].amount, Money::php(dec!(750)));
    assert_eq!(ledger[0].webhook_event_id.as_deref(), Some(confirming.as_str()));
}

#[tokio::test]
async fn test_failed_rider_confirmation_leaves_no_ledger_entry() {
    let Some(stores) = stores("test_failed_rider_confirmation_leaves_no_ledger_entry").await else {
        return;
    };
    let order = OrderBuilder::new().build();
    let entry = PaymentTransaction::rider_confirmed(&order, PaymentMethod::Cash, None, Utc::now());
    let order_id = seed(&stores, order).await;

    // Still pending and unassigned, so the confirmation misses
    let update = ConditionalOrderUpdate::new(order_id)
        .expect_status(&[OrderStatus::Delivering, OrderStatus::PaymentPending])
        .expect_rider(RiderGuard::AssignedTo(RiderId::new()))
        .with_changes(OrderChanges {
            payment_method: Some(PaymentMethod::Cash),
            ..OrderChanges::status(OrderStatus::PaymentConfirmed)
        })
        .record(entry);
    let outcome = stores.orders.update_order(update).await.unwrap();

    assert_eq!(outcome, WriteOutcome::PreconditionFailed);
    assert!(stores.orders.payment_transactions(order_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_confirmed_settlement_cannot_be_reopened() {
    let Some(stores) = stores("test_confirmed_settlement_cannot_be_reopened").await else {
        return;
    };
    let init = SettlementInit {
        rider_id: RiderId::new(),
        settlement_date: TemporalFixtures::business_date(),
        amount: Money::php(dec!(1200)),
        payment_reference: "SET-1718000000000-AB12".to_string(),
        at: Utc::now(),
    };

    let settlement = match stores.obligations.open_settlement(init.clone()).await.unwrap() {
        WriteOutcome::Applied(settlement) => settlement,
        WriteOutcome::PreconditionFailed => panic!("fresh settlement should open"),
    };
    assert_eq!(settlement.status, ObligationStatus::Pending);

    let paid = stores
        .obligations
        .record_payment(PaymentWrite {
            target: ObligationRef::Settlement(settlement.id),
            confirm: true,
            ..payment(OrderId::new(), Money::php(dec!(0)), None, Money::php(dec!(1200)), &event_id("stl"))
        })
        .await
        .unwrap();
    assert!(paid.is_applied());

    let reopened = stores.obligations.open_settlement(init).await.unwrap();
    assert_eq!(reopened, WriteOutcome::PreconditionFailed);

    let stored = stores.obligations.get_settlement(settlement.id).await.unwrap();
    assert_eq!(stored.status, ObligationStatus::Confirmed);
    assert_eq!(stored.amount_paid, Money::php(dec!(1200)));
}
