// tests/payout_tests.rs
mod common;

use common::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use settlement_core::{LedgerStore, LedgerTx, PayoutStatus, SettlementError, TransactionType};
use serial_test::serial;
use std::sync::atomic::Ordering;
use uuid::Uuid;

#[tokio::test]
async fn test_payout_cannot_exceed_pending_earnings() {
  let m = Market::new();
  m.earn(m.seller_x, dec!(100.00)).await;
  assert_eq!(m.service.pending_earnings(m.seller_x).await.unwrap(), dec!(90.00));

  let too_much = m.service.request_payout(m.seller_x, dec!(100.00), "BANK_TRANSFER").await;
  match too_much {
    Err(SettlementError::Validation(msg)) => assert!(msg.contains("exceeds pending earnings")),
    other => panic!("expected validation error, got {other:?}"),
  }

  let ok = m.service.request_payout(m.seller_x, dec!(90.00), "bank_transfer").await.unwrap();
  assert_eq!(ok.payout.transaction_fee, dec!(1.80));
  assert_eq!(ok.payout.net_amount, dec!(88.20));
  assert_eq!(ok.payout.status, PayoutStatus::Pending);
  assert_eq!(ok.payout.payout_method, "BANK_TRANSFER");
  assert!(ok.payout.payout_reference.starts_with("PO_"));
  assert_eq!(ok.remaining_earnings, Decimal::ZERO);
  assert_eq!(m.service.pending_earnings(m.seller_x).await.unwrap(), Decimal::ZERO);
}

#[tokio::test]
#[serial]
async fn test_concurrent_payout_requests_reserve_once() {
  let m = Market::new();
  m.earn(m.seller_x, dec!(55.56)).await;
  assert_eq!(m.service.pending_earnings(m.seller_x).await.unwrap(), dec!(50.00));

  let mut handles = Vec::new();
  for _ in 0..2 {
    let service = m.service.clone();
    let seller = m.seller_x;
    handles.push(tokio::spawn(async move {
      service.request_payout(seller, dec!(50.00), "BANK_TRANSFER").await
    }));
  }
  let mut ok = 0;
  let mut rejected = 0;
  for h in handles {
    match h.await.unwrap() {
      Ok(_) => ok += 1,
      Err(SettlementError::Validation(_)) => rejected += 1,
      Err(other) => panic!("unexpected error {other}"),
    }
  }
  assert_eq!((ok, rejected), (1, 1));
  assert_eq!(m.service.payouts_for_seller(m.seller_x).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_processing_books_payout_and_fee_rows_once() {
  let m = Market::new();
  m.earn(m.seller_x, dec!(100.00)).await;
  let payout = m.service.request_payout(m.seller_x, dec!(50.00), "PAYPAL").await.unwrap().payout;

  assert!(m.service.process_payout(payout.id).await.unwrap());
  assert!(!m.service.process_payout(payout.id).await.unwrap());
  assert_eq!(m.gateway.disbursements.load(Ordering::SeqCst), 1);

  let stored = m.service.payout(payout.id).await.unwrap();
  assert_eq!(stored.status, PayoutStatus::Completed);
  assert!(stored.processed_date.is_some());

  let rows = m.service.ledger_for_payout(payout.id).await.unwrap();
  let amount_of = |kind: TransactionType| rows.iter().find(|t| t.transaction_type == kind).map(|t| t.amount);
  assert_eq!(amount_of(TransactionType::Payout), Some(dec!(-49.00)));
  assert_eq!(amount_of(TransactionType::Fee), Some(dec!(-1.00)));

  let summary = m.service.seller_summary(m.seller_x).await.unwrap();
  assert_eq!(summary.paid_out, dec!(50.00));
  assert_eq!(summary.reserved, Decimal::ZERO);
  assert_eq!(summary.pending_earnings, dec!(40.00));
  assert!(m.notifier.titles_for(m.seller_x).contains(&"Payout Completed".to_string()));

  let missing = m.service.process_payout(Uuid::new_v4()).await;
  assert!(matches!(missing, Err(SettlementError::NotFound(_))));
}

#[tokio::test]
async fn test_failed_disbursement_releases_the_reservation() {
  let m = Market::new();
  m.earn(m.seller_x, dec!(100.00)).await;
  m.gateway.set_disbursement(false);
  let payout = m.service.request_payout(m.seller_x, dec!(60.00), "BANK_TRANSFER").await.unwrap().payout;
  assert_eq!(m.service.pending_earnings(m.seller_x).await.unwrap(), dec!(30.00));

  assert!(!m.service.process_payout(payout.id).await.unwrap());
  let stored = m.service.payout(payout.id).await.unwrap();
  assert_eq!(stored.status, PayoutStatus::Failed);
  assert_eq!(stored.failure_reason.as_deref(), Some("Payout processing failed"));
  assert!(m.service.ledger_for_payout(payout.id).await.unwrap().is_empty());
  assert_eq!(m.service.pending_earnings(m.seller_x).await.unwrap(), dec!(90.00));
}

#[tokio::test]
async fn test_payout_request_validation() {
  let m = Market::new();
  m.earn(m.seller_x, dec!(100.00)).await;

  let unsupported = m.service.request_payout(m.seller_x, dec!(10.00), "CARRIER_PIGEON").await;
  assert!(matches!(unsupported, Err(SettlementError::Validation(_))));

  let fee_eats_it = m.service.request_payout(m.seller_x, dec!(0.50), "BANK_TRANSFER").await;
  assert!(matches!(fee_eats_it, Err(SettlementError::Validation(_))));

  let not_a_seller = m.service.request_payout(m.buyer, dec!(10.00), "BANK_TRANSFER").await;
  assert!(matches!(not_a_seller, Err(SettlementError::Validation(_))));

  let negative = m.service.request_payout(m.seller_x, dec!(-1.00), "BANK_TRANSFER").await;
  assert!(matches!(negative, Err(SettlementError::Validation(_))));
}

#[tokio::test]
#[serial]
async fn test_weekly_run_pays_eligible_sellers_once() {
  let m = Market::new();
  m.earn(m.seller_x, dec!(100.00)).await;
  m.earn(m.seller_y, dec!(5.00)).await;

  let report = m.service.run_weekly_payouts().await.unwrap();
  assert_eq!(report.created.len(), 1);
  let payout = &report.created[0];
  assert_eq!(payout.seller_id, m.seller_x);
  assert_eq!(payout.amount, dec!(90.00));
  assert_eq!(payout.payout_method, "PAYPAL");
  assert!(report.skipped.iter().any(|s| s.seller_id == m.seller_y));

  // Earnings are already reserved, so a second run creates nothing.
  let again = m.service.run_weekly_payouts().await.unwrap();
  assert!(again.created.is_empty());
  assert_eq!(m.service.payouts_for_seller(m.seller_x).await.unwrap().len(), 1);
}

#[tokio::test]
#[serial]
async fn test_concurrent_weekly_runs_do_not_double_book() {
  let m = Market::new();
  m.earn(m.seller_x, dec!(100.00)).await;

  let a = {
    let service = m.service.clone();
    tokio::spawn(async move { service.run_weekly_payouts().await })
  };
  let b = {
    let service = m.service.clone();
    tokio::spawn(async move { service.run_weekly_payouts().await })
  };
  let created = a.await.unwrap().unwrap().created.len() + b.await.unwrap().unwrap().created.len();
  assert_eq!(created, 1);
}

#[tokio::test]
async fn test_refund_after_payout_leaves_debt_not_negative_earnings() {
  let m = Market::new();
  let paid = m.earn(m.seller_x, dec!(100.00)).await;
  let payout = m.service.request_payout(m.seller_x, dec!(90.00), "BANK_TRANSFER").await.unwrap().payout;
  m.service.process_payout(payout.id).await.unwrap();

  m.service.refund(paid.payment_id, dec!(100.00), "Chargeback").await.unwrap();
  let summary = m.service.seller_summary(m.seller_x).await.unwrap();
  assert_eq!(summary.pending_earnings, Decimal::ZERO);
  assert_eq!(summary.outstanding_debt, dec!(90.00));

  let blocked = m.service.request_payout(m.seller_x, dec!(10.00), "BANK_TRANSFER").await;
  assert!(matches!(blocked, Err(SettlementError::Validation(_))));
}

#[tokio::test]
async fn test_payout_stranded_in_processing_can_be_failed_and_requested_again() {
  let m = Market::new();
  m.earn(m.seller_x, dec!(50.00)).await;
  let payout = m.service.request_payout(m.seller_x, dec!(45.00), "PAYPAL").await.unwrap().payout;

  let early = m.service.fail_stuck_payout(payout.id, "gateway lost").await;
  assert!(matches!(early, Err(SettlementError::Validation(_))), "PENDING payouts are processed, not failed");

  // Disbursement went out but the booking transaction never committed.
  let mut tx = m.store.begin().await.unwrap();
  let mut stuck = tx.lock_payout(payout.id).await.unwrap().unwrap();
  stuck.status = PayoutStatus::Processing;
  tx.update_payout(&stuck).await.unwrap();
  tx.commit().await.unwrap();

  assert!(!m.service.process_payout(payout.id).await.unwrap());
  assert_eq!(m.service.pending_earnings(m.seller_x).await.unwrap(), Decimal::ZERO);

  let failed = m.service.fail_stuck_payout(payout.id, "Finalization lost; rail shows no transfer").await.unwrap();
  assert_eq!(failed.status, PayoutStatus::Failed);
  assert_eq!(failed.failure_reason.as_deref(), Some("Finalization lost; rail shows no transfer"));
  assert!(m.service.ledger_for_payout(payout.id).await.unwrap().is_empty());
  assert!(m.notifier.titles_for(m.seller_x).contains(&"Payout Failed".to_string()));

  assert_eq!(m.service.pending_earnings(m.seller_x).await.unwrap(), dec!(45.00));
  let again = m.service.request_payout(m.seller_x, dec!(45.00), "PAYPAL").await.unwrap();
  assert_eq!(again.payout.status, PayoutStatus::Pending);

  let twice = m.service.fail_stuck_payout(payout.id, "again").await;
  assert!(matches!(twice, Err(SettlementError::Validation(_))));
  let missing = m.service.fail_stuck_payout(Uuid::new_v4(), "nope").await;
  assert!(matches!(missing, Err(SettlementError::NotFound(_))));
}
