// tests/refund_tests.rs
mod common;

use common::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use settlement_core::{
  EarningsKind, LedgerStore, OrderLine, PaymentStatus, SellerAccount, SettlementError, TransactionType,
};
use uuid::Uuid;

#[tokio::test]
async fn test_two_partial_refunds_complete_the_refund() {
  let m = Market::new();
  let paid = m.earn(m.seller_x, dec!(100.00)).await;

  let first = m.service.refund(paid.payment_id, dec!(40.00), "Damaged item").await.unwrap();
  assert_eq!(first.status, PaymentStatus::PartiallyRefunded);
  assert_eq!(first.refunded_amount, dec!(40.00));

  let second = m.service.refund(paid.payment_id, dec!(60.00), "").await.unwrap();
  assert_eq!(second.status, PaymentStatus::Refunded);
  assert_eq!(second.refunded_amount, dec!(100.00));

  let third = m.service.refund(paid.payment_id, dec!(0.01), "one more").await;
  assert!(matches!(third, Err(SettlementError::Validation(_))));

  let ledger = m.service.ledger_for_payment(paid.payment_id).await.unwrap();
  let refunds: Vec<_> = ledger
    .iter()
    .filter(|t| t.transaction_type == TransactionType::Refund)
    .collect();
  assert_eq!(refunds.len(), 2);
  assert!(refunds.iter().all(|t| t.amount < Decimal::ZERO));
  assert!(refunds.iter().any(|t| t.description.ends_with("Requested by customer")));

  // 36.00 then 54.00: exactly the 90.00 that was credited comes back out.
  let entries = m.store.earnings_for_payment(paid.payment_id).await.unwrap();
  let debits: Vec<Decimal> = entries
    .iter()
    .filter(|e| e.kind == EarningsKind::Debit)
    .map(|e| e.amount)
    .collect();
  assert_eq!(debits.iter().copied().sum::<Decimal>(), dec!(90.00));
  assert!(debits.contains(&dec!(36.00)));

  let summary = m.service.seller_summary(m.seller_x).await.unwrap();
  assert_eq!(summary.pending_earnings, Decimal::ZERO);
  assert_eq!(summary.outstanding_debt, Decimal::ZERO);
  assert_eq!(summary.total_revenue, Decimal::ZERO);
}

#[tokio::test]
async fn test_refund_debits_sellers_by_their_credit_share() {
  let m = Market::new();
  let order = m.split_order().await;
  let paid = m.pay(&order).await;

  m.service.refund(paid.payment_id, dec!(50.00), "Partial return").await.unwrap();

  let entries = m.store.earnings_for_payment(paid.payment_id).await.unwrap();
  let debit_for = |seller: Uuid| {
    entries
      .iter()
      .filter(|e| e.seller_id == seller && e.kind == EarningsKind::Debit)
      .map(|e| e.amount)
      .sum::<Decimal>()
  };
  // 45.00 of the 90.00 earnings come back, split 60:30.
  assert_eq!(debit_for(m.seller_x), dec!(30.00));
  assert_eq!(debit_for(m.seller_y), dec!(15.00));

  assert_eq!(m.service.pending_earnings(m.seller_x).await.unwrap(), dec!(30.00));
  assert_eq!(m.service.pending_earnings(m.seller_y).await.unwrap(), dec!(15.00));
  assert!(m.notifier.titles_for(m.seller_y).contains(&"Order Refunded".to_string()));
}

#[tokio::test]
async fn test_tiny_refund_across_equal_sellers_debits_only_its_earnings() {
  let m = Market::new();
  let mut lines = Vec::new();
  for n in 0..4 {
    let seller_id = Uuid::new_v4();
    m.directory.add_seller(SellerAccount {
      user_id: seller_id,
      display_name: format!("Seller {n}"),
      default_payout_method: None,
    });
    lines.push(OrderLine {
      product_id: m.listing(seller_id, dec!(1.00)),
      quantity: 1,
    });
  }
  let order = m.service.place_order(m.buyer, lines).await.unwrap();
  let paid = m.pay(&order).await;
  assert_eq!(paid.status, PaymentStatus::Completed);

  m.service.refund(paid.payment_id, dec!(0.02), "Price adjustment").await.unwrap();

  let entries = m.store.earnings_for_payment(paid.payment_id).await.unwrap();
  let debits: Vec<Decimal> = entries
    .iter()
    .filter(|e| e.kind == EarningsKind::Debit)
    .map(|e| e.amount)
    .collect();
  assert!(debits.iter().all(|d| *d > Decimal::ZERO));
  assert_eq!(debits.iter().copied().sum::<Decimal>(), dec!(0.02));

  // The rest of the refund then returns every credited cent, no more.
  m.service.refund(paid.payment_id, dec!(3.98), "Returned").await.unwrap();
  let entries = m.store.earnings_for_payment(paid.payment_id).await.unwrap();
  let net: Decimal = entries
    .iter()
    .map(|e| match e.kind {
      EarningsKind::Credit => e.amount,
      EarningsKind::Debit => -e.amount,
    })
    .sum();
  assert_eq!(net, Decimal::ZERO);
}

#[tokio::test]
async fn test_refund_bounds_and_status_are_checked() {
  let m = Market::new();
  let paid = m.earn(m.seller_x, dec!(20.00)).await;

  for bad in [dec!(0), dec!(-5.00), dec!(1.005)] {
    let r = m.service.refund(paid.payment_id, bad, "bad amount").await;
    assert!(matches!(r, Err(SettlementError::Validation(_))), "{bad} should be rejected");
  }

  let too_much = m.service.refund(paid.payment_id, dec!(20.01), "too much").await;
  match too_much {
    Err(SettlementError::Validation(msg)) => assert!(msg.contains("exceeds the remaining refundable amount")),
    other => panic!("expected validation error, got {other:?}"),
  }
  // Nothing was written by the rejected calls.
  assert_eq!(m.service.payment(paid.payment_id).await.unwrap().refunded_amount, Decimal::ZERO);

  let missing = m.service.refund(Uuid::new_v4(), dec!(1.00), "nope").await;
  assert!(matches!(missing, Err(SettlementError::NotFound(_))));
}

#[tokio::test]
async fn test_failed_payment_cannot_be_refunded() {
  let m = Market::new();
  m.gateway.set_capture(false);
  let order = m.order_from(m.seller_x, dec!(15.00)).await;
  let failed = m.pay(&order).await;

  let r = m.service.refund(failed.payment_id, dec!(5.00), "refund").await;
  match r {
    Err(SettlementError::Validation(msg)) => assert!(msg.contains("FAILED")),
    other => panic!("expected validation error, got {other:?}"),
  }
}

#[tokio::test]
async fn test_concurrent_refunds_never_exceed_the_amount() {
  let m = Market::new();
  let paid = m.earn(m.seller_x, dec!(30.00)).await;

  let mut handles = Vec::new();
  for _ in 0..3 {
    let service = m.service.clone();
    let payment_id = paid.payment_id;
    handles.push(tokio::spawn(async move {
      service.refund(payment_id, dec!(20.00), "race").await
    }));
  }
  let mut succeeded = 0;
  for h in handles {
    if h.await.unwrap().is_ok() {
      succeeded += 1;
    }
  }
  assert_eq!(succeeded, 1);
  let payment = m.service.payment(paid.payment_id).await.unwrap();
  assert_eq!(payment.refunded_amount, dec!(20.00));
  assert_eq!(payment.status, PaymentStatus::PartiallyRefunded);
}
