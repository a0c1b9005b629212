// tests/capture_tests.rs
mod common;

use common::*;
use rust_decimal_macros::dec;
use async_trait::async_trait;
use settlement_core::{
  CaptureRequest, DisbursementRequest, EarningsKind, GatewayOutcome, InMemoryDirectory, LedgerStore, LedgerTx,
  MemoryLedgerStore, OrderLine, OrderStatus, PaymentGateway, PaymentMethod, PaymentStatus, ProductListing,
  SellerAccount, SettlementError, SettlementService, TransactionType,
};
use std::sync::Arc;
use serial_test::serial;
use std::sync::atomic::Ordering;
use uuid::Uuid;

#[tokio::test]
async fn test_capture_splits_commission_and_confirms_order() {
  let m = Market::new();
  let order = m.order_from(m.seller_x, dec!(100.00)).await;

  let result = m.pay(&order).await;
  assert_eq!(result.status, PaymentStatus::Completed);
  assert!(result.succeeded());
  assert!(!result.retryable);

  let payment = m.service.payment(result.payment_id).await.unwrap();
  assert_eq!(payment.commission_amount, dec!(10.00));
  assert_eq!(payment.seller_earnings, dec!(90.00));
  assert!(payment.transaction_id.starts_with("TXN_"));
  assert!(payment.payment_date.is_some());

  let order = m.service.order(order.id).await.unwrap();
  assert_eq!(order.status, OrderStatus::Confirmed);
  assert_eq!(order.payment_id, Some(payment.id));

  let ledger = m.service.ledger_for_payment(payment.id).await.unwrap();
  assert_eq!(ledger.len(), 1);
  assert_eq!(ledger[0].transaction_type, TransactionType::Payment);
  assert_eq!(ledger[0].amount, dec!(100.00));
  assert_eq!(ledger[0].user_id, m.buyer);

  assert_eq!(m.service.pending_earnings(m.seller_x).await.unwrap(), dec!(90.00));
}

#[tokio::test]
async fn test_declined_capture_records_failed_payment_and_leaves_order_pending() {
  let m = Market::new();
  m.gateway.set_capture(false);
  let order = m.order_from(m.seller_x, dec!(25.00)).await;

  let result = m.pay(&order).await;
  assert_eq!(result.status, PaymentStatus::Failed);
  assert!(result.retryable);
  assert_eq!(result.message, "Payment processing failed");

  let order_after = m.service.order(order.id).await.unwrap();
  assert_eq!(order_after.status, OrderStatus::Pending);
  assert!(m.service.ledger_for_payment(result.payment_id).await.unwrap().is_empty());
  assert_eq!(m.service.pending_earnings(m.seller_x).await.unwrap(), dec!(0.00));

  // A retry after the decline goes through.
  m.gateway.set_capture(true);
  let retry = m.pay(&order).await;
  assert_eq!(retry.status, PaymentStatus::Completed);
  assert_ne!(retry.payment_id, result.payment_id);
}

#[tokio::test]
async fn test_multi_seller_order_credits_each_seller_by_subtotal() {
  let m = Market::new();
  let order = m.split_order().await;
  assert_eq!(order.total_amount, dec!(100.00));

  let result = m.pay(&order).await;
  let entries = m.store.earnings_for_payment(result.payment_id).await.unwrap();
  assert!(entries.iter().all(|e| e.kind == EarningsKind::Credit));
  let credit_for = |seller: Uuid| entries.iter().filter(|e| e.seller_id == seller).map(|e| e.amount).sum::<rust_decimal::Decimal>();
  assert_eq!(credit_for(m.seller_x), dec!(60.00));
  assert_eq!(credit_for(m.seller_y), dec!(30.00));

  assert!(m.notifier.titles_for(m.buyer).contains(&"Payment Successful".to_string()));
  assert!(m.notifier.titles_for(m.seller_y).contains(&"New Order Payment".to_string()));
}

#[tokio::test]
async fn test_capture_rejects_wrong_buyer_and_paid_orders() {
  let m = Market::new();
  let order = m.order_from(m.seller_x, dec!(10.00)).await;

  let stranger = m
    .service
    .capture(order.id, Uuid::new_v4(), PaymentMethod::Paypal)
    .await;
  assert!(matches!(stranger, Err(SettlementError::Validation(_))));

  m.pay(&order).await;
  let again = m.service.capture(order.id, m.buyer, PaymentMethod::Paypal).await;
  assert!(matches!(again, Err(SettlementError::Validation(_))));
  assert_eq!(m.gateway.captures.load(Ordering::SeqCst), 1);

  let missing = m.service.capture(Uuid::new_v4(), m.buyer, PaymentMethod::Paypal).await;
  assert!(matches!(missing, Err(SettlementError::NotFound(_))));
}

#[tokio::test]
#[serial]
async fn test_concurrent_captures_confirm_the_order_once() {
  let m = Market::new();
  let order = m.order_from(m.seller_x, dec!(40.00)).await;

  let a = {
    let service = m.service.clone();
    let (order_id, buyer) = (order.id, m.buyer);
    tokio::spawn(async move { service.capture(order_id, buyer, PaymentMethod::CreditCard).await })
  };
  let b = {
    let service = m.service.clone();
    let (order_id, buyer) = (order.id, m.buyer);
    tokio::spawn(async move { service.capture(order_id, buyer, PaymentMethod::CreditCard).await })
  };
  let outcomes = [a.await.unwrap(), b.await.unwrap()];

  let completed = outcomes
    .iter()
    .filter(|r| matches!(r, Ok(p) if p.status == PaymentStatus::Completed))
    .count();
  assert_eq!(completed, 1);
  assert_eq!(m.service.pending_earnings(m.seller_x).await.unwrap(), dec!(36.00));

  let stats = m.service.payment_statistics().await.unwrap();
  assert_eq!(stats.completed, 1);
  assert_eq!(stats.gross_volume, dec!(40.00));
  assert_eq!(stats.commission_earned, dec!(4.00));
}

#[tokio::test]
async fn test_notification_failures_leave_capture_and_refund_committed() {
  let (m, failing) = Market::with_failing_notifier();
  let order = m.order_from(m.seller_x, dec!(40.00)).await;

  let result = m.pay(&order).await;
  assert_eq!(result.status, PaymentStatus::Completed);
  assert_eq!(m.service.order(order.id).await.unwrap().status, OrderStatus::Confirmed);
  let ledger = m.service.ledger_for_payment(result.payment_id).await.unwrap();
  assert!(ledger.iter().any(|t| t.transaction_type == TransactionType::Payment));
  assert_eq!(m.service.pending_earnings(m.seller_x).await.unwrap(), dec!(36.00));

  let refund = m.service.refund(result.payment_id, dec!(10.00), "Scratched").await.unwrap();
  assert_eq!(refund.status, PaymentStatus::PartiallyRefunded);
  let ledger = m.service.ledger_for_payment(result.payment_id).await.unwrap();
  assert!(ledger.iter().any(|t| t.transaction_type == TransactionType::Refund));

  // Order placed, payment, refund: every one of them tried and failed to notify.
  assert!(failing.attempts.load(Ordering::SeqCst) >= 3);
  assert_eq!(m.notifier.count(), 0);
}

/// Approves every capture, but first corrupts the stored commission split of
/// the payment it was asked about.
struct CorruptingGateway {
  store: Arc<MemoryLedgerStore>,
}

#[async_trait]
impl PaymentGateway for CorruptingGateway {
  fn name(&self) -> &str {
    "CORRUPTING"
  }

  async fn capture(&self, request: &CaptureRequest) -> anyhow::Result<GatewayOutcome> {
    let mut tx = self.store.begin().await?;
    if let Some(mut payment) = tx.lock_payment(request.payment_id).await? {
      payment.commission_amount += dec!(1.00);
      tx.update_payment(&payment).await?;
    }
    tx.commit().await?;
    Ok(GatewayOutcome::Approved {
      response: "Payment processed successfully".into(),
    })
  }

  async fn disburse(&self, _request: &DisbursementRequest) -> anyhow::Result<GatewayOutcome> {
    Ok(GatewayOutcome::Declined {
      reason: "not used".into(),
    })
  }
}

#[tokio::test]
async fn test_settlement_refused_by_invariants_marks_payment_failed() {
  setup_tracing();
  let store = Arc::new(MemoryLedgerStore::new());
  let directory = Arc::new(InMemoryDirectory::new());
  let buyer = Uuid::new_v4();
  let seller = Uuid::new_v4();
  let product_id = Uuid::new_v4();
  directory.add_user(buyer, "Buyer");
  directory.add_seller(SellerAccount {
    user_id: seller,
    display_name: "Seller".into(),
    default_payout_method: None,
  });
  directory.add_product(ProductListing {
    id: product_id,
    seller_id: seller,
    title: "Kettle".into(),
    price: dec!(30.00),
    active: true,
  });
  let service = SettlementService::new(
    store.clone(),
    Arc::new(CorruptingGateway { store: store.clone() }),
    Arc::new(RecordingNotifier::default()),
    directory,
    test_config(),
  )
  .unwrap();

  let order = service
    .place_order(buyer, vec![OrderLine { product_id, quantity: 1 }])
    .await
    .unwrap();
  let err = service.capture(order.id, buyer, PaymentMethod::CreditCard).await.unwrap_err();
  assert!(matches!(err, SettlementError::Consistency(_)), "got {err:?}");

  let payments = service.payments_for_buyer(buyer).await.unwrap();
  assert_eq!(payments.len(), 1);
  assert_eq!(payments[0].status, PaymentStatus::Failed);
  assert!(payments[0]
    .gateway_response
    .as_deref()
    .is_some_and(|r| r.starts_with("Settlement aborted")));

  assert_eq!(service.order(order.id).await.unwrap().status, OrderStatus::Pending);
  assert!(service.ledger_for_payment(payments[0].id).await.unwrap().is_empty());
  assert_eq!(service.pending_earnings(seller).await.unwrap(), dec!(0));
}
