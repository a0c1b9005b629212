// core/src/pipelines/refund.rs

//! Full and partial refunds of a captured payment.

use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::{event, instrument, Level};
use uuid::Uuid;

use super::common_steps::{notify_all, verify_apportioned, verify_payment};
use super::contexts::RefundCtx;
use crate::commission;
use crate::error::{Result, SettlementError};
use crate::ledger::{
  EarningsKind, FinancialTransaction, Payment, PaymentStatus, SellerEarningsEntry, TransactionType,
};
use crate::money::{require_positive_amount, round_half_up};
use crate::notify::{Notification, NotificationCategory};
use crate::results::PaymentResult;
use crate::workflow::{ContextData, Pipeline, PipelineControl, PipelineRegistry, WorkflowError};

pub const REFUND_PIPELINE: &str = "refund_payment";
const DEFAULT_REASON: &str = "Requested by customer";

pub fn refund_pipeline() -> Pipeline<RefundCtx, SettlementError> {
  let mut p = Pipeline::<RefundCtx, SettlementError>::new(
    REFUND_PIPELINE,
    &[
      ("validate_refund", false, None),
      ("apply_refund", false, None),
      ("notify_parties", true, None),
    ],
  );
  p.on_root("validate_refund", |ctx: ContextData<RefundCtx>| Box::pin(validate_refund(ctx)));
  p.on_root("apply_refund", |ctx: ContextData<RefundCtx>| Box::pin(apply_refund(ctx)));
  p.on_root("notify_parties", |ctx: ContextData<RefundCtx>| Box::pin(notify_parties(ctx)));
  p
}

pub fn register_refund_pipeline(registry: &PipelineRegistry<SettlementError>) -> Result<(), WorkflowError> {
  registry.register_pipeline(refund_pipeline())
}

/// Status and bound checks, repeated under the payment lock in `apply_refund`.
fn check_refundable(payment: &Payment, amount: Decimal) -> Result<()> {
  if !payment.status.is_refundable() {
    return Err(SettlementError::validation(format!(
      "payment {} is {}; only COMPLETED or PARTIALLY_REFUNDED payments can be refunded",
      payment.transaction_id, payment.status
    )));
  }
  let remaining = payment.remaining_refundable();
  if amount > remaining {
    return Err(SettlementError::validation(format!(
      "refund amount {amount} exceeds the remaining refundable amount {remaining} of payment {}",
      payment.transaction_id
    )));
  }
  Ok(())
}

#[instrument(name = "refund::validate_refund", skip_all, err(Display))]
async fn validate_refund(ctx: ContextData<RefundCtx>) -> Result<PipelineControl> {
  let (store, payment_id, amount) = {
    let guard = ctx.read();
    (guard.deps.store.clone(), guard.payment_id, guard.amount)
  };

  let amount = require_positive_amount(amount, "refund amount")?;
  let payment = store
    .payment(payment_id)
    .await?
    .ok_or_else(|| SettlementError::not_found(format!("payment {payment_id}")))?;
  check_refundable(&payment, amount)?;

  let mut guard = ctx.write();
  guard.amount = amount;
  if guard.reason.trim().is_empty() {
    guard.reason = DEFAULT_REASON.to_string();
  }
  guard.payment = Some(payment);
  Ok(PipelineControl::Continue)
}

/// Seller debits for a refund already added to `payment.refunded_amount`.
///
/// The earnings refunded so far track the refunded share of the payment,
/// `round_half_up(refunded * seller_earnings / amount)`, and this refund debits
/// the step from what was already debited. That step is split across sellers
/// by the credit each still has on this payment, so a full refund returns
/// exactly what was credited and no seller is debited past their credit.
fn refund_debits(payment: &Payment, entries: &[SellerEarningsEntry]) -> Result<Vec<(Uuid, Decimal)>> {
  let mut remaining: BTreeMap<Uuid, Decimal> = BTreeMap::new();
  for entry in entries {
    let share = remaining.entry(entry.seller_id).or_default();
    match entry.kind {
      EarningsKind::Credit => *share += entry.amount,
      EarningsKind::Debit => *share -= entry.amount,
    }
  }
  let credited: Decimal = entries
    .iter()
    .filter(|e| e.kind == EarningsKind::Credit)
    .map(|e| e.amount)
    .sum();
  let already_debited = credited - remaining.values().copied().sum::<Decimal>();

  let refunded_earnings = if payment.refunded_amount == payment.amount {
    credited
  } else {
    round_half_up(payment.refunded_amount * payment.seller_earnings / payment.amount).min(credited)
  };
  let step = (refunded_earnings - already_debited).max(Decimal::ZERO);

  let weights: Vec<(Uuid, Decimal)> = remaining.into_iter().filter(|(_, left)| *left > Decimal::ZERO).collect();
  if step.is_zero() || weights.is_empty() {
    return Ok(Vec::new());
  }
  let debits: Vec<(Uuid, Decimal)> = commission::apportion(step, &weights)
    .into_iter()
    .filter(|(_, debit)| *debit > Decimal::ZERO)
    .collect();
  verify_apportioned("seller refund debits", step, &debits)?;
  Ok(debits)
}

#[instrument(name = "refund::apply_refund", skip_all, err(Display))]
async fn apply_refund(ctx: ContextData<RefundCtx>) -> Result<PipelineControl> {
  let (store, payment_id, amount, reason) = {
    let guard = ctx.read();
    (guard.deps.store.clone(), guard.payment_id, guard.amount, guard.reason.clone())
  };

  let mut tx = store.begin().await?;
  let mut payment = tx
    .lock_payment(payment_id)
    .await?
    .ok_or_else(|| SettlementError::not_found(format!("payment {payment_id}")))?;
  check_refundable(&payment, amount)?;

  let now = Utc::now();
  payment.refunded_amount = round_half_up(payment.refunded_amount + amount);
  payment.status = if payment.refunded_amount == payment.amount {
    PaymentStatus::Refunded
  } else {
    PaymentStatus::PartiallyRefunded
  };
  payment.refund_date = Some(now);
  payment.updated_at = now;
  verify_payment(&payment)?;

  let debits = refund_debits(&payment, &tx.earnings_for_payment(payment.id).await?)?;

  tx.update_payment(&payment).await?;
  tx.append_transaction(&FinancialTransaction::for_payment(
    TransactionType::Refund,
    -amount,
    payment.buyer_id,
    payment.id,
    &payment.transaction_id,
    format!("Refund for payment {}: {reason}", payment.transaction_id),
  ))
  .await?;
  for (seller_id, debit) in &debits {
    tx.append_earnings(&SellerEarningsEntry::new(
      *seller_id,
      payment.id,
      payment.order_id,
      EarningsKind::Debit,
      *debit,
    ))
    .await?;
  }
  tx.commit().await?;
  payment.version += 1;

  event!(Level::INFO, %payment_id, %amount, refunded_total = %payment.refunded_amount, status = %payment.status, "Refund applied.");
  let message = format!("Refund of ${amount} processed successfully");
  {
    let mut guard = ctx.write();
    guard.result = Some(PaymentResult::from_payment(&payment, false, message));
    guard.seller_debits = debits;
    guard.payment = Some(payment);
  }
  Ok(PipelineControl::Continue)
}

#[instrument(name = "refund::notify_parties", skip_all)]
async fn notify_parties(ctx: ContextData<RefundCtx>) -> Result<PipelineControl> {
  let (notifier, notifications) = {
    let guard = ctx.read();
    let mut notifications = Vec::new();
    if let Some(payment) = guard.payment.as_ref() {
      notifications.push(Notification::new(
        payment.buyer_id,
        "Refund Processed",
        format!("Your refund of ${} has been processed", guard.amount),
        NotificationCategory::Refund,
        payment.id,
      ));
      for (seller_id, debit) in &guard.seller_debits {
        notifications.push(Notification::new(
          *seller_id,
          "Order Refunded",
          format!("${debit} was deducted from your earnings for order {}", payment.order_id),
          NotificationCategory::Refund,
          payment.order_id,
        ));
      }
    }
    (guard.deps.notifier.clone(), notifications)
  };

  let sent = notify_all(&notifier, notifications).await;
  ctx.write().notifications_sent = sent;
  Ok(PipelineControl::Continue)
}
