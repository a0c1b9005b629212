// tests/order_lifecycle_tests.rs
mod common;

use common::*;
use rust_decimal_macros::dec;
use settlement_core::{Actor, OrderLine, OrderStatus, ProductListing, SettlementError};
use uuid::Uuid;

#[tokio::test]
async fn test_place_order_snapshots_prices_and_totals() {
  let m = Market::new();
  let x = m.listing(m.seller_x, dec!(12.50));
  let y = m.listing(m.seller_y, dec!(3.25));

  let order = m
    .service
    .place_order(
      m.buyer,
      vec![
        OrderLine { product_id: x, quantity: 2 },
        OrderLine { product_id: y, quantity: 4 },
      ],
    )
    .await
    .unwrap();

  assert_eq!(order.status, OrderStatus::Pending);
  assert_eq!(order.total_amount, dec!(38.00));
  assert_eq!(order.items.len(), 2);
  assert!(order.items.iter().all(|i| i.order_id == order.id));
  assert_eq!(order.seller_subtotals().get(&m.seller_y), Some(&dec!(13.00)));

  let stored = m.service.order(order.id).await.unwrap();
  assert_eq!(stored.items.len(), 2);
  assert!(m.notifier.titles_for(m.seller_x).contains(&"New Order Received".to_string()));
}

#[tokio::test]
async fn test_place_order_rejects_bad_lines() {
  let m = Market::new();
  let x = m.listing(m.seller_x, dec!(5.00));

  let empty = m.service.place_order(m.buyer, vec![]).await;
  assert!(matches!(empty, Err(SettlementError::Validation(_))));

  let zero = m.service.place_order(m.buyer, vec![OrderLine { product_id: x, quantity: 0 }]).await;
  assert!(matches!(zero, Err(SettlementError::Validation(_))));

  let unknown = m
    .service
    .place_order(m.buyer, vec![OrderLine { product_id: Uuid::new_v4(), quantity: 1 }])
    .await;
  assert!(matches!(unknown, Err(SettlementError::NotFound(_))));

  let retired = Uuid::new_v4();
  m.directory.add_product(ProductListing {
    id: retired,
    seller_id: m.seller_x,
    title: "Retired".into(),
    price: dec!(1.00),
    active: false,
  });
  let inactive = m.service.place_order(m.buyer, vec![OrderLine { product_id: retired, quantity: 1 }]).await;
  assert!(matches!(inactive, Err(SettlementError::Validation(_))));

  let own = m.service.place_order(m.seller_x, vec![OrderLine { product_id: x, quantity: 1 }]).await;
  assert!(matches!(own, Err(SettlementError::Validation(_))));
}

#[tokio::test]
async fn test_buyer_can_cancel_unpaid_order_only() {
  let m = Market::new();
  let unpaid = m.order_from(m.seller_x, dec!(8.00)).await;

  let stranger = m.service.cancel_order(unpaid.id, Uuid::new_v4()).await;
  assert!(matches!(stranger, Err(SettlementError::Validation(_))));

  let cancelled = m.service.cancel_order(unpaid.id, m.buyer).await.unwrap();
  assert_eq!(cancelled.status, OrderStatus::Cancelled);
  assert!(m.notifier.titles_for(m.seller_x).contains(&"Order Cancelled".to_string()));

  let pay_cancelled = m.service.capture(unpaid.id, m.buyer, settlement_core::PaymentMethod::Paypal).await;
  assert!(matches!(pay_cancelled, Err(SettlementError::Validation(_))));

  let paid = m.order_from(m.seller_x, dec!(8.00)).await;
  m.pay(&paid).await;
  let too_late = m.service.cancel_order(paid.id, m.buyer).await;
  assert!(matches!(too_late, Err(SettlementError::Validation(_))));
}

#[tokio::test]
async fn test_seller_completes_confirmed_order() {
  let m = Market::new();
  let order = m.order_from(m.seller_x, dec!(9.99)).await;

  let early = m.service.complete_order(order.id, m.seller_x).await;
  assert!(matches!(early, Err(SettlementError::Validation(_))));

  m.pay(&order).await;
  let not_theirs = m.service.complete_order(order.id, m.seller_y).await;
  assert!(matches!(not_theirs, Err(SettlementError::Validation(_))));

  let done = m.service.complete_order(order.id, m.seller_x).await.unwrap();
  assert_eq!(done.status, OrderStatus::Completed);

  let backwards = m
    .service
    .update_order_status(order.id, OrderStatus::Confirmed, Actor::Admin)
    .await;
  assert!(matches!(backwards, Err(SettlementError::Validation(_))));
}

#[tokio::test]
async fn test_admin_cannot_confirm_without_payment() {
  let m = Market::new();
  let order = m.order_from(m.seller_y, dec!(4.00)).await;
  let forced = m
    .service
    .update_order_status(order.id, OrderStatus::Confirmed, Actor::Admin)
    .await;
  assert!(matches!(forced, Err(SettlementError::Validation(_))));

  let missing = m
    .service
    .update_order_status(Uuid::new_v4(), OrderStatus::Cancelled, Actor::Admin)
    .await;
  assert!(matches!(missing, Err(SettlementError::NotFound(_))));
}
