//! Integration tests for the delivery workflow against the mock store

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use core_kernel::{Money, RiderId};
use domain_delivery::ports::mock::MockOrderStore;
use domain_delivery::{
    DeliveryError, DeliveryService, OrderQuery, OrderStatus, PaymentConfirmation, PaymentMethod,
    ProofOfDelivery,
};
use rust_decimal_macros::dec;
use test_utils::{
    assert_money_eq, assert_order_status, MoneyFixtures, OrderBuilder, OrderFixtures, TemporalFixtures,
};

fn service(store: &MockOrderStore) -> DeliveryService {
    DeliveryService::new(Arc::new(store.clone()))
}

#[tokio::test]
async fn test_full_cash_delivery() {
    let store = MockOrderStore::new();
    let service = service(&store);
    let rider = RiderId::new();

    let order = service
        .create_order(OrderFixtures::new_order(MoneyFixtures::cod_750()))
        .await
        .unwrap();
    assert_order_status(&order, OrderStatus::Pending);

    service.claim(order.id, rider).await.unwrap();
    service.verify_pickup(order.id, rider, " pkg-0001 ").await.unwrap();
    service.start_delivering(order.id, rider).await.unwrap();
    let paid = service
        .confirm_payment_direct(
            order.id,
            rider,
            PaymentConfirmation {
                method: PaymentMethod::Cash,
                cash_audit_note: Some("Exact change".to_string()),
                payment_reference: None,
            },
        )
        .await
        .unwrap();
    assert_order_status(&paid, OrderStatus::PaymentConfirmed);
    assert_eq!(paid.cash_audit_note.as_deref(), Some("Exact change"));

    let done = service
        .complete(
            order.id,
            rider,
            ProofOfDelivery {
                photo_url: "memory://pod/1.jpg".to_string(),
                latitude: Some(14.55),
                longitude: Some(121.02),
            },
        )
        .await
        .unwrap();
    assert_order_status(&done, OrderStatus::Completed);
    assert!(done.completed_at.is_some());
}

#[tokio::test]
async fn test_concurrent_claims_have_one_winner() {
    let store = MockOrderStore::new();
    let service = service(&store);
    let order = service
        .create_order(OrderFixtures::new_order(MoneyFixtures::cod_750()))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let service = service.clone();
        let order_id = order.id;
        handles.push(tokio::spawn(async move {
            service.claim(order_id, RiderId::new()).await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => winners += 1,
            Err(DeliveryError::NotClaimable { status }) => assert_eq!(status, OrderStatus::Accepted),
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn test_other_rider_cannot_act_on_claimed_order() {
    let store = MockOrderStore::new();
    let service = service(&store);
    let owner = RiderId::new();
    let order = service
        .create_order(OrderFixtures::new_order(MoneyFixtures::cod_750()))
        .await
        .unwrap();
    service.claim(order.id, owner).await.unwrap();

    let result = service
        .verify_pickup(order.id, RiderId::new(), OrderFixtures::BARCODE)
        .await;

    assert!(matches!(result, Err(DeliveryError::NotAssigned(_))));
    assert_order_status(&service.get_order(order.id).await.unwrap(), OrderStatus::Accepted);
}

#[tokio::test]
async fn test_cancelled_order_is_terminal() {
    let store = MockOrderStore::new();
    let service = service(&store);
    let rider = RiderId::new();
    let order = service
        .create_order(OrderFixtures::new_order(MoneyFixtures::cod_750()))
        .await
        .unwrap();
    service.claim(order.id, rider).await.unwrap();

    service.cancel(order.id).await.unwrap();

    assert!(service.cancel(order.id).await.is_err());
    assert!(service.verify_pickup(order.id, rider, OrderFixtures::BARCODE).await.is_err());
}

#[tokio::test]
async fn test_daily_summary_uses_business_day() {
    let rider = RiderId::new();
    let morning = TemporalFixtures::mid_morning();
    // 23:30 Manila on the previous day
    let previous_night = Utc.with_ymd_and_hms(2024, 6, 13, 15, 30, 0).unwrap();

    let store = MockOrderStore::with_orders(vec![
        OrderBuilder::new()
            .cod(Money::php(dec!(750)))
            .completed(rider, PaymentMethod::Cash, morning)
            .build(),
        OrderBuilder::new()
            .cod(Money::php(dec!(200)))
            .completed(rider, PaymentMethod::Cash, morning + Duration::hours(2))
            .build(),
        OrderBuilder::new()
            .cod(Money::php(dec!(1200)))
            .completed(rider, PaymentMethod::Qrph, morning + Duration::hours(3))
            .build(),
        OrderBuilder::new()
            .cod(Money::php(dec!(999)))
            .completed(rider, PaymentMethod::Cash, previous_night)
            .build(),
        OrderBuilder::new()
            .cod(Money::php(dec!(500)))
            .completed(RiderId::new(), PaymentMethod::Cash, morning)
            .build(),
    ])
    .await;

    let summary = service(&store)
        .daily_summary(rider, TemporalFixtures::business_date(), &TemporalFixtures::manila())
        .await
        .unwrap();

    assert_eq!(summary.total_deliveries, 3);
    assert_eq!(summary.cash_count, 2);
    assert_money_eq(&summary.cash_amount, dec!(950));
    assert_eq!(summary.qrph_count, 1);
    assert_money_eq(&summary.qrph_amount, dec!(1200));
    assert_money_eq(&summary.total_collected, dec!(2150));
}

#[tokio::test]
async fn test_available_orders_paginate_newest_first() {
    let store = MockOrderStore::new();
    let service = service(&store);
    let mut created = Vec::new();
    for cod in [100, 200, 300] {
        let order = service
            .create_order(OrderFixtures::new_order(MoneyFixtures::php(cod)))
            .await
            .unwrap();
        created.push(order.id);
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }
    service.claim(created[0], RiderId::new()).await.unwrap();

    let first = service
        .list_orders(&OrderQuery::available().page(1, 1))
        .await
        .unwrap();
    let second = service
        .list_orders(&OrderQuery::available().page(2, 1))
        .await
        .unwrap();
    let third = service
        .list_orders(&OrderQuery::available().page(3, 1))
        .await
        .unwrap();

    assert_eq!(first[0].id, created[2]);
    assert_eq!(second[0].id, created[1]);
    assert!(third.is_empty());
}
