// core/src/pipelines/common_steps.rs

//! Checks and helpers shared by several settlement pipelines.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{event, Level};

use crate::error::{Result, SettlementError};
use crate::ledger::{Payment, PaymentStatus, Payout};
use crate::notify::{dispatch, Notification, NotificationSink};
use uuid::Uuid;

/// Re-checks the money invariants of a payment about to be persisted.
pub(crate) fn verify_payment(payment: &Payment) -> Result<()> {
  if payment.commission_amount + payment.seller_earnings != payment.amount {
    return Err(SettlementError::consistency(format!(
      "payment {}: commission {} + seller earnings {} != amount {}",
      payment.id, payment.commission_amount, payment.seller_earnings, payment.amount
    )));
  }
  if payment.refunded_amount < Decimal::ZERO || payment.refunded_amount > payment.amount {
    return Err(SettlementError::consistency(format!(
      "payment {}: refunded {} outside 0..={}",
      payment.id, payment.refunded_amount, payment.amount
    )));
  }
  let status_agrees = match payment.status {
    PaymentStatus::Refunded => payment.refunded_amount == payment.amount,
    PaymentStatus::PartiallyRefunded => {
      payment.refunded_amount > Decimal::ZERO && payment.refunded_amount < payment.amount
    }
    _ => payment.refunded_amount.is_zero(),
  };
  if !status_agrees {
    return Err(SettlementError::consistency(format!(
      "payment {}: status {} disagrees with refunded amount {}",
      payment.id, payment.status, payment.refunded_amount
    )));
  }
  Ok(())
}

pub(crate) fn verify_payout(payout: &Payout) -> Result<()> {
  if payout.net_amount != payout.amount - payout.transaction_fee || payout.net_amount <= Decimal::ZERO {
    return Err(SettlementError::consistency(format!(
      "payout {}: net {} must be positive and equal amount {} - fee {}",
      payout.id, payout.net_amount, payout.amount, payout.transaction_fee
    )));
  }
  Ok(())
}

/// Parts produced by `commission::apportion` must add back up to their total.
pub(crate) fn verify_apportioned(what: &str, total: Decimal, parts: &[(Uuid, Decimal)]) -> Result<()> {
  let sum: Decimal = parts.iter().map(|(_, p)| *p).sum();
  if sum != total {
    return Err(SettlementError::consistency(format!(
      "{what}: parts sum to {sum}, expected {total}"
    )));
  }
  Ok(())
}

/// Sends notifications once the ledger work has committed.
pub(crate) async fn notify_all(sink: &Arc<dyn NotificationSink>, notifications: Vec<Notification>) -> usize {
  let attempted = notifications.len();
  let delivered = dispatch(sink, notifications).await;
  if delivered < attempted {
    event!(Level::WARN, attempted, delivered, "Some notifications were not delivered.");
  }
  delivered
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::commission;
  use crate::ledger::PaymentMethod;
  use chrono::Utc;
  use rust_decimal_macros::dec;

  fn payment(amount: Decimal) -> Payment {
    let now = Utc::now();
    let mut p = Payment {
      id: Uuid::new_v4(),
      order_id: Uuid::new_v4(),
      buyer_id: Uuid::new_v4(),
      amount,
      status: PaymentStatus::Completed,
      payment_method: PaymentMethod::CreditCard,
      transaction_id: "TXN_00000000".into(),
      payment_gateway: "test".into(),
      gateway_response: None,
      commission_rate: dec!(10),
      commission_amount: Decimal::ZERO,
      seller_earnings: Decimal::ZERO,
      refunded_amount: Decimal::ZERO,
      version: 0,
      payment_date: Some(now),
      refund_date: None,
      created_at: now,
      updated_at: now,
    };
    commission::recompute(&mut p);
    p
  }

  #[test]
  fn completed_payment_with_split_passes() {
    assert!(verify_payment(&payment(dec!(100.00))).is_ok());
  }

  #[test]
  fn refunded_status_requires_full_refund() {
    let mut p = payment(dec!(100.00));
    p.status = PaymentStatus::Refunded;
    p.refunded_amount = dec!(40.00);
    assert!(matches!(verify_payment(&p), Err(SettlementError::Consistency(_))));
    p.status = PaymentStatus::PartiallyRefunded;
    assert!(verify_payment(&p).is_ok());
  }

  #[test]
  fn tampered_split_is_rejected() {
    let mut p = payment(dec!(100.00));
    p.seller_earnings = dec!(91.00);
    assert!(verify_payment(&p).is_err());
  }

  #[test]
  fn apportioned_parts_must_sum() {
    let id = Uuid::new_v4();
    assert!(verify_apportioned("credits", dec!(1.00), &[(id, dec!(1.00))]).is_ok());
    assert!(verify_apportioned("credits", dec!(1.00), &[(id, dec!(0.99))]).is_err());
  }
}
