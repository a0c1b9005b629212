// core/src/pipelines/payout.rs

//! Payout creation (reserving earnings), payout processing (disbursing
//! through the gateway and booking PAYOUT and FEE rows) and the operator path
//! for payouts stranded in PROCESSING.

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use tracing::{event, instrument, Level};
use uuid::Uuid;

use super::common_steps::{notify_all, verify_payout};
use super::contexts::{CreatePayoutCtx, FailPayoutCtx, ProcessPayoutCtx};
use crate::error::{Result, SettlementError};
use crate::fees::{normalize, recompute_net};
use crate::gateway::{bounded, DisbursementRequest, GatewayOutcome};
use crate::ledger::{generate_reference, FinancialTransaction, Payout, PayoutStatus, TransactionType};
use crate::money::require_positive_amount;
use crate::notify::{Notification, NotificationCategory};
use crate::workflow::{ContextData, Pipeline, PipelineControl, PipelineRegistry, WorkflowError};

pub const CREATE_PAYOUT_PIPELINE: &str = "create_payout";
pub const PROCESS_PAYOUT_PIPELINE: &str = "process_payout";
pub const FAIL_STUCK_PAYOUT_PIPELINE: &str = "fail_stuck_payout";

pub fn create_payout_pipeline() -> Pipeline<CreatePayoutCtx, SettlementError> {
  let mut p = Pipeline::<CreatePayoutCtx, SettlementError>::new(
    CREATE_PAYOUT_PIPELINE,
    &[
      ("validate_request", false, None),
      ("reserve_earnings", false, None),
      ("notify_seller", true, None),
    ],
  );
  p.on_root("validate_request", |ctx: ContextData<CreatePayoutCtx>| {
    Box::pin(validate_request(ctx))
  });
  p.on_root("reserve_earnings", |ctx: ContextData<CreatePayoutCtx>| {
    Box::pin(reserve_earnings(ctx))
  });
  p.on_root("notify_seller", |ctx: ContextData<CreatePayoutCtx>| {
    Box::pin(notify_requested(ctx))
  });
  p
}

pub fn process_payout_pipeline() -> Pipeline<ProcessPayoutCtx, SettlementError> {
  let mut p = Pipeline::<ProcessPayoutCtx, SettlementError>::new(
    PROCESS_PAYOUT_PIPELINE,
    &[
      ("begin_processing", false, None),
      ("disburse", false, None),
      ("finalize_payout", false, None),
      ("notify_seller", true, None),
    ],
  );
  p.on_root("begin_processing", |ctx: ContextData<ProcessPayoutCtx>| {
    Box::pin(begin_processing(ctx))
  });
  p.on_root("disburse", |ctx: ContextData<ProcessPayoutCtx>| Box::pin(disburse(ctx)));
  p.on_root("finalize_payout", |ctx: ContextData<ProcessPayoutCtx>| {
    Box::pin(finalize_payout(ctx))
  });
  p.on_root("notify_seller", |ctx: ContextData<ProcessPayoutCtx>| {
    Box::pin(notify_processed(ctx))
  });
  p
}

pub fn fail_stuck_payout_pipeline() -> Pipeline<FailPayoutCtx, SettlementError> {
  let mut p = Pipeline::<FailPayoutCtx, SettlementError>::new(
    FAIL_STUCK_PAYOUT_PIPELINE,
    &[("mark_failed", false, None), ("notify_seller", true, None)],
  );
  p.on_root("mark_failed", |ctx: ContextData<FailPayoutCtx>| Box::pin(mark_failed(ctx)));
  p.on_root("notify_seller", |ctx: ContextData<FailPayoutCtx>| Box::pin(notify_failed(ctx)));
  p
}

pub fn register_payout_pipelines(registry: &PipelineRegistry<SettlementError>) -> Result<(), WorkflowError> {
  registry.register_pipeline(create_payout_pipeline())?;
  registry.register_pipeline(process_payout_pipeline())?;
  registry.register_pipeline(fail_stuck_payout_pipeline())
}

#[instrument(name = "payout::validate_request", skip_all, err(Display))]
async fn validate_request(ctx: ContextData<CreatePayoutCtx>) -> Result<PipelineControl> {
  let (deps, seller_id, amount, method) = {
    let guard = ctx.read();
    (guard.deps.clone(), guard.seller_id, guard.amount, guard.method.clone())
  };

  let amount = require_positive_amount(amount, "payout amount")?;
  let method = normalize(&method);
  let fee = deps.config.fee_schedule.fee_for(&method, amount)?;
  if amount - fee <= Decimal::ZERO {
    return Err(SettlementError::validation(format!(
      "payout amount {amount} does not cover the {fee} {method} fee"
    )));
  }
  if deps.directory.seller(seller_id).await?.is_none() {
    return Err(SettlementError::validation(format!("user {seller_id} is not a seller")));
  }

  let mut guard = ctx.write();
  guard.amount = amount;
  guard.method = method;
  guard.transaction_fee = fee;
  Ok(PipelineControl::Continue)
}

#[instrument(name = "payout::reserve_earnings", skip_all, err(Display))]
async fn reserve_earnings(ctx: ContextData<CreatePayoutCtx>) -> Result<PipelineControl> {
  let (deps, seller_id, amount, method, fee) = {
    let guard = ctx.read();
    (
      guard.deps.clone(),
      guard.seller_id,
      guard.amount,
      guard.method.clone(),
      guard.transaction_fee,
    )
  };

  let mut tx = deps.store.begin().await?;
  tx.lock_seller(seller_id).await?;
  let available = tx.seller_balance(seller_id).await?.available();
  if amount > available {
    return Err(SettlementError::validation(format!(
      "requested payout {amount} exceeds pending earnings {available}"
    )));
  }

  let now = Utc::now();
  let today = now.date_naive();
  let mut payout = Payout {
    id: Uuid::new_v4(),
    seller_id,
    amount,
    transaction_fee: fee,
    net_amount: Decimal::ZERO,
    status: PayoutStatus::Pending,
    payout_method: method,
    payout_reference: generate_reference("PO_"),
    failure_reason: None,
    period_start: today - Duration::days(deps.config.payout_period_days),
    period_end: today,
    estimated_arrival: today + Duration::days(deps.config.payout_arrival_days),
    processed_date: None,
    created_at: now,
    updated_at: now,
  };
  recompute_net(&mut payout);
  verify_payout(&payout)?;

  tx.insert_payout(&payout).await?;
  tx.commit().await?;

  event!(Level::INFO, payout_id = %payout.id, reference = %payout.payout_reference, %amount, fee = %payout.transaction_fee, "Payout reserved.");
  let mut guard = ctx.write();
  guard.remaining_earnings = available - amount;
  guard.payout = Some(payout);
  Ok(PipelineControl::Continue)
}

#[instrument(name = "payout::notify_requested", skip_all)]
async fn notify_requested(ctx: ContextData<CreatePayoutCtx>) -> Result<PipelineControl> {
  let (notifier, notifications) = {
    let guard = ctx.read();
    let notifications = guard
      .payout
      .as_ref()
      .map(|payout| {
        vec![Notification::new(
          payout.seller_id,
          "Payout Requested",
          format!(
            "Your payout of ${} ({}) is scheduled to arrive by {}",
            payout.net_amount, payout.payout_reference, payout.estimated_arrival
          ),
          NotificationCategory::Payout,
          payout.id,
        )]
      })
      .unwrap_or_default();
    (guard.deps.notifier.clone(), notifications)
  };
  let sent = notify_all(&notifier, notifications).await;
  ctx.write().notifications_sent = sent;
  Ok(PipelineControl::Continue)
}

#[instrument(name = "payout::begin_processing", skip_all, err(Display))]
async fn begin_processing(ctx: ContextData<ProcessPayoutCtx>) -> Result<PipelineControl> {
  let (store, payout_id) = {
    let guard = ctx.read();
    (guard.deps.store.clone(), guard.payout_id)
  };

  let mut tx = store.begin().await?;
  let mut payout = tx
    .lock_payout(payout_id)
    .await?
    .ok_or_else(|| SettlementError::not_found(format!("payout {payout_id}")))?;

  if payout.status != PayoutStatus::Pending {
    event!(Level::INFO, %payout_id, status = %payout.status, "Payout is not PENDING; nothing to process.");
    let mut guard = ctx.write();
    guard.processed = false;
    guard.payout = Some(payout);
    return Ok(PipelineControl::Stop);
  }

  let now = Utc::now();
  payout.status = PayoutStatus::Processing;
  payout.processed_date = Some(now);
  payout.updated_at = now;
  tx.update_payout(&payout).await?;
  tx.commit().await?;

  ctx.write().payout = Some(payout);
  Ok(PipelineControl::Continue)
}

#[instrument(name = "payout::disburse", skip_all)]
async fn disburse(ctx: ContextData<ProcessPayoutCtx>) -> Result<PipelineControl> {
  let (gateway, timeout, request) = {
    let guard = ctx.read();
    let payout = guard
      .payout
      .as_ref()
      .ok_or_else(|| SettlementError::Internal("disbursement reached without a payout".into()))?;
    (
      guard.deps.gateway.clone(),
      guard.deps.config.gateway_timeout,
      DisbursementRequest {
        payout_reference: payout.payout_reference.clone(),
        payout_id: payout.id,
        seller_id: payout.seller_id,
        net_amount: payout.net_amount,
        method: payout.payout_method.clone(),
      },
    )
  };

  let outcome = bounded("disburse", timeout, gateway.disburse(&request)).await;
  event!(Level::INFO, reference = %request.payout_reference, approved = outcome.is_approved(), "Gateway answered disbursement.");
  ctx.write().outcome = Some(outcome);
  Ok(PipelineControl::Continue)
}

#[instrument(name = "payout::finalize_payout", skip_all, err(Display))]
async fn finalize_payout(ctx: ContextData<ProcessPayoutCtx>) -> Result<PipelineControl> {
  let (store, payout_id, outcome) = {
    let guard = ctx.read();
    (guard.deps.store.clone(), guard.payout_id, guard.outcome.clone())
  };
  let outcome =
    outcome.ok_or_else(|| SettlementError::Internal("finalization reached without a gateway outcome".into()))?;

  let mut tx = store.begin().await?;
  let mut payout = tx
    .lock_payout(payout_id)
    .await?
    .ok_or_else(|| SettlementError::consistency(format!("payout {payout_id} vanished during processing")))?;
  if payout.status != PayoutStatus::Processing {
    return Err(SettlementError::consistency(format!(
      "payout {payout_id} is {} while finalizing; expected PROCESSING",
      payout.status
    )));
  }

  payout.updated_at = Utc::now();
  let approved = match outcome {
    GatewayOutcome::Approved { .. } => {
      payout.status = PayoutStatus::Completed;
      verify_payout(&payout)?;
      tx.append_transaction(&FinancialTransaction::for_payout(
        TransactionType::Payout,
        -payout.net_amount,
        payout.seller_id,
        payout.id,
        &payout.payout_reference,
        format!("Payout {}", payout.payout_reference),
      ))
      .await?;
      if payout.transaction_fee > Decimal::ZERO {
        tx.append_transaction(&FinancialTransaction::for_payout(
          TransactionType::Fee,
          -payout.transaction_fee,
          payout.seller_id,
          payout.id,
          &payout.payout_reference,
          format!("Payout fee for {}", payout.payout_reference),
        ))
        .await?;
      }
      true
    }
    GatewayOutcome::Declined { reason } => {
      payout.status = PayoutStatus::Failed;
      payout.failure_reason = Some(reason);
      false
    }
  };
  tx.update_payout(&payout).await?;
  tx.commit().await?;

  event!(Level::INFO, %payout_id, status = %payout.status, "Payout finalized.");
  let mut guard = ctx.write();
  guard.processed = approved;
  guard.payout = Some(payout);
  Ok(PipelineControl::Continue)
}

/// Completed or failed, told to the seller after the outcome committed.
fn outcome_notification(payout: &Payout) -> Notification {
  let (title, message) = match payout.status {
    PayoutStatus::Completed => (
      "Payout Completed",
      format!("Your payout of ${} has been sent", payout.net_amount),
    ),
    _ => (
      "Payout Failed",
      format!(
        "Your payout {} failed: {}",
        payout.payout_reference,
        payout.failure_reason.as_deref().unwrap_or("unknown reason")
      ),
    ),
  };
  Notification::new(payout.seller_id, title, message, NotificationCategory::Payout, payout.id)
}

#[instrument(name = "payout::notify_processed", skip_all)]
async fn notify_processed(ctx: ContextData<ProcessPayoutCtx>) -> Result<PipelineControl> {
  let (notifier, notifications) = {
    let guard = ctx.read();
    let notifications: Vec<Notification> = guard.payout.iter().map(outcome_notification).collect();
    (guard.deps.notifier.clone(), notifications)
  };
  let sent = notify_all(&notifier, notifications).await;
  ctx.write().notifications_sent = sent;
  Ok(PipelineControl::Continue)
}

/// PROCESSING -> FAILED for a payout whose finalization never committed.
/// Releases the reservation; nothing is written to the ledger.
#[instrument(name = "payout::mark_failed", skip_all, err(Display))]
async fn mark_failed(ctx: ContextData<FailPayoutCtx>) -> Result<PipelineControl> {
  let (store, payout_id, reason) = {
    let guard = ctx.read();
    (guard.deps.store.clone(), guard.payout_id, guard.reason.trim().to_string())
  };
  if reason.is_empty() {
    return Err(SettlementError::validation("a failure reason is required"));
  }

  let mut tx = store.begin().await?;
  let mut payout = tx
    .lock_payout(payout_id)
    .await?
    .ok_or_else(|| SettlementError::not_found(format!("payout {payout_id}")))?;
  if payout.status != PayoutStatus::Processing {
    return Err(SettlementError::validation(format!(
      "payout {payout_id} is {}; only PROCESSING payouts can be failed by hand",
      payout.status
    )));
  }

  payout.status = PayoutStatus::Failed;
  payout.failure_reason = Some(reason);
  payout.updated_at = Utc::now();
  tx.update_payout(&payout).await?;
  tx.commit().await?;

  event!(Level::WARN, %payout_id, reference = %payout.payout_reference, "Stuck payout marked FAILED.");
  ctx.write().payout = Some(payout);
  Ok(PipelineControl::Continue)
}

#[instrument(name = "payout::notify_failed", skip_all)]
async fn notify_failed(ctx: ContextData<FailPayoutCtx>) -> Result<PipelineControl> {
  let (notifier, notifications) = {
    let guard = ctx.read();
    let notifications: Vec<Notification> = guard.payout.iter().map(outcome_notification).collect();
    (guard.deps.notifier.clone(), notifications)
  };
  let sent = notify_all(&notifier, notifications).await;
  ctx.write().notifications_sent = sent;
  Ok(PipelineControl::Continue)
}
