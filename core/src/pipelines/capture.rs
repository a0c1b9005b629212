// core/src/pipelines/capture.rs

//! Payment capture: PENDING order -> gateway -> COMPLETED payment, CONFIRMED
//! order, a PAYMENT ledger row and one earnings credit per seller.

use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{event, instrument, Level};
use uuid::Uuid;

use super::common_steps::{notify_all, verify_apportioned, verify_payment};
use super::contexts::CaptureCtx;
use crate::commission;
use crate::error::{Result, SettlementError};
use crate::gateway::{bounded, CaptureRequest, GatewayOutcome};
use crate::ledger::{
  generate_reference, EarningsKind, FinancialTransaction, OrderStatus, Payment, PaymentStatus, SellerEarningsEntry,
  TransactionType,
};
use crate::notify::{Notification, NotificationCategory};
use crate::order_state::{self, Actor};
use crate::results::PaymentResult;
use crate::store::LedgerStore;
use crate::workflow::{ContextData, Pipeline, PipelineControl, PipelineRegistry, WorkflowError};

pub const CAPTURE_PIPELINE: &str = "capture_payment";

pub fn capture_pipeline() -> Pipeline<CaptureCtx, SettlementError> {
  let mut p = Pipeline::<CaptureCtx, SettlementError>::new(
    CAPTURE_PIPELINE,
    &[
      ("load_order", false, None),
      ("open_payment", false, None),
      ("authorize_with_gateway", false, None),
      ("settle_payment", false, None),
      ("notify_parties", true, None),
    ],
  );

  p.on_root("load_order", |ctx: ContextData<CaptureCtx>| Box::pin(load_order(ctx)));
  p.on_root("open_payment", |ctx: ContextData<CaptureCtx>| Box::pin(open_payment(ctx)));
  p.on_root("authorize_with_gateway", |ctx: ContextData<CaptureCtx>| {
    Box::pin(authorize_with_gateway(ctx))
  });
  p.on_root("settle_payment", |ctx: ContextData<CaptureCtx>| Box::pin(settle_payment(ctx)));
  p.on_root("notify_parties", |ctx: ContextData<CaptureCtx>| Box::pin(notify_parties(ctx)));
  p
}

pub fn register_capture_pipeline(registry: &PipelineRegistry<SettlementError>) -> Result<(), WorkflowError> {
  registry.register_pipeline(capture_pipeline())
}

#[instrument(name = "capture::load_order", skip_all, err(Display))]
async fn load_order(ctx: ContextData<CaptureCtx>) -> Result<PipelineControl> {
  let (store, order_id, buyer_id) = {
    let guard = ctx.read();
    (guard.deps.store.clone(), guard.order_id, guard.buyer_id)
  };

  let order = store
    .order(order_id)
    .await?
    .ok_or_else(|| SettlementError::not_found(format!("order {order_id}")))?;

  if order.buyer_id != buyer_id {
    return Err(SettlementError::validation(format!(
      "order {order_id} does not belong to buyer {buyer_id}"
    )));
  }
  if order.status != OrderStatus::Pending {
    return Err(SettlementError::validation(format!(
      "order {order_id} is {}; only PENDING orders can be paid",
      order.status
    )));
  }
  if order.total_amount <= Decimal::ZERO {
    return Err(SettlementError::validation(format!(
      "order {order_id} has a non-positive total {}",
      order.total_amount
    )));
  }
  if order.items.is_empty() || !order.total_matches_items() {
    return Err(SettlementError::consistency(format!(
      "order {order_id} total {} does not match its items",
      order.total_amount
    )));
  }

  ctx.write().order = Some(order);
  Ok(PipelineControl::Continue)
}

#[instrument(name = "capture::open_payment", skip_all, err(Display))]
async fn open_payment(ctx: ContextData<CaptureCtx>) -> Result<PipelineControl> {
  let (deps, order_id, buyer_id, method) = {
    let guard = ctx.read();
    (guard.deps.clone(), guard.order_id, guard.buyer_id, guard.method)
  };

  let mut tx = deps.store.begin().await?;
  let order = tx
    .lock_order(order_id)
    .await?
    .ok_or_else(|| SettlementError::not_found(format!("order {order_id}")))?;
  if order.status != OrderStatus::Pending {
    return Err(SettlementError::validation(format!(
      "order {order_id} is {}; only PENDING orders can be paid",
      order.status
    )));
  }

  let now = Utc::now();
  let mut payment = Payment {
    id: Uuid::new_v4(),
    order_id,
    buyer_id,
    amount: order.total_amount,
    status: PaymentStatus::Pending,
    payment_method: method,
    transaction_id: generate_reference("TXN_"),
    payment_gateway: deps.gateway.name().to_string(),
    gateway_response: None,
    commission_rate: deps.config.commission_rate,
    commission_amount: Decimal::ZERO,
    seller_earnings: Decimal::ZERO,
    refunded_amount: Decimal::ZERO,
    version: 0,
    payment_date: None,
    refund_date: None,
    created_at: now,
    updated_at: now,
  };
  commission::recompute(&mut payment);
  verify_payment(&payment)?;

  tx.insert_payment(&payment).await?;
  tx.commit().await?;

  event!(Level::INFO, payment_id = %payment.id, transaction_id = %payment.transaction_id, amount = %payment.amount, "Payment opened.");
  {
    let mut guard = ctx.write();
    guard.order = Some(order);
    guard.payment = Some(payment);
  }
  Ok(PipelineControl::Continue)
}

#[instrument(name = "capture::authorize_with_gateway", skip_all)]
async fn authorize_with_gateway(ctx: ContextData<CaptureCtx>) -> Result<PipelineControl> {
  let (gateway, timeout, request) = {
    let guard = ctx.read();
    let payment = guard
      .payment
      .as_ref()
      .ok_or_else(|| SettlementError::Internal("capture reached the gateway without a payment".into()))?;
    (
      guard.deps.gateway.clone(),
      guard.deps.config.gateway_timeout,
      CaptureRequest {
        transaction_id: payment.transaction_id.clone(),
        payment_id: payment.id,
        buyer_id: payment.buyer_id,
        amount: payment.amount,
        method: payment.payment_method,
      },
    )
  };

  let outcome = bounded("capture", timeout, gateway.capture(&request)).await;
  event!(Level::INFO, transaction_id = %request.transaction_id, approved = outcome.is_approved(), "Gateway answered capture.");
  ctx.write().gateway_outcome = Some(outcome);
  Ok(PipelineControl::Continue)
}

#[instrument(name = "capture::settle_payment", skip_all, err(Display))]
async fn settle_payment(ctx: ContextData<CaptureCtx>) -> Result<PipelineControl> {
  let (store, payment_id, order_id, outcome) = {
    let guard = ctx.read();
    let payment_id = guard.payment.as_ref().map(|p| p.id);
    (guard.deps.store.clone(), payment_id, guard.order_id, guard.gateway_outcome.clone())
  };
  let (Some(payment_id), Some(outcome)) = (payment_id, outcome) else {
    return Err(SettlementError::Internal("settlement reached without payment or gateway outcome".into()));
  };

  let (mut payment, credits, retryable, message) = match settle(&store, payment_id, order_id, outcome).await {
    Ok(settled) => settled,
    Err(SettlementError::Consistency(reason)) => {
      mark_aborted(&store, payment_id, &reason).await;
      return Err(SettlementError::Consistency(reason));
    }
    Err(e) => return Err(e),
  };
  payment.version += 1;

  event!(Level::INFO, %payment_id, status = %payment.status, "Payment settled.");
  let completed = payment.status == PaymentStatus::Completed;
  {
    let mut guard = ctx.write();
    guard.result = Some(PaymentResult::from_payment(&payment, retryable, message));
    guard.seller_credits = credits;
    guard.payment = Some(payment);
    if completed {
      if let Some(order) = guard.order.as_mut() {
        order.status = OrderStatus::Confirmed;
        order.payment_id = Some(payment_id);
      }
    }
  }

  Ok(if completed {
    PipelineControl::Continue
  } else {
    PipelineControl::Stop
  })
}

type Settled = (Payment, Vec<(Uuid, Decimal)>, bool, String);

/// The settlement transaction proper. Returns the written payment, the seller
/// credits, whether the caller may retry, and the result message.
async fn settle(
  store: &Arc<dyn LedgerStore>,
  payment_id: Uuid,
  order_id: Uuid,
  outcome: GatewayOutcome,
) -> Result<Settled> {
  let mut tx = store.begin().await?;
  let mut payment = tx
    .lock_payment(payment_id)
    .await?
    .ok_or_else(|| SettlementError::consistency(format!("payment {payment_id} vanished before settlement")))?;
  let order = tx
    .lock_order(order_id)
    .await?
    .ok_or_else(|| SettlementError::consistency(format!("order {order_id} vanished before settlement")))?;

  let now = Utc::now();
  payment.updated_at = now;
  let mut credits = Vec::new();

  let (retryable, message) = match outcome {
    GatewayOutcome::Approved { response } if order.status == OrderStatus::Pending => {
      let next = order_state::transition(&order, OrderStatus::Confirmed, Actor::System, false)?;
      payment.status = PaymentStatus::Completed;
      payment.payment_date = Some(now);
      payment.gateway_response = Some(response);
      verify_payment(&payment)?;

      let weights: Vec<(Uuid, Decimal)> = order.seller_subtotals().into_iter().collect();
      credits = commission::apportion(payment.seller_earnings, &weights)
        .into_iter()
        .filter(|(_, amount)| *amount > Decimal::ZERO)
        .collect();
      verify_apportioned("seller credits", payment.seller_earnings, &credits)?;

      tx.update_payment(&payment).await?;
      tx.update_order_status(order.id, next, Some(payment.id)).await?;
      tx.append_transaction(&FinancialTransaction::for_payment(
        TransactionType::Payment,
        payment.amount,
        payment.buyer_id,
        payment.id,
        &payment.transaction_id,
        format!("Payment for order {}", order.id),
      ))
      .await?;
      for (seller_id, amount) in &credits {
        tx.append_earnings(&SellerEarningsEntry::new(
          *seller_id,
          payment.id,
          order.id,
          EarningsKind::Credit,
          *amount,
        ))
        .await?;
      }
      (false, "Payment processed successfully".to_string())
    }
    GatewayOutcome::Approved { .. } => {
      // Another payment confirmed the order while this one was at the gateway.
      payment.status = PaymentStatus::Failed;
      payment.gateway_response = Some(format!(
        "Capture voided: order {} is already {}",
        order.id, order.status
      ));
      tx.update_payment(&payment).await?;
      (false, format!("Order {} was already settled by another payment", order.id))
    }
    GatewayOutcome::Declined { reason } => {
      payment.status = PaymentStatus::Failed;
      payment.gateway_response = Some(reason.clone());
      tx.update_payment(&payment).await?;
      (true, reason)
    }
  };

  tx.commit().await?;
  Ok((payment, credits, retryable, message))
}

/// Records a settlement the invariant checks refused, so the payment does not
/// sit PENDING with the gateway's approval unaccounted for.
async fn mark_aborted(store: &Arc<dyn LedgerStore>, payment_id: Uuid, reason: &str) {
  let marked: Result<()> = async {
    let mut tx = store.begin().await?;
    if let Some(mut payment) = tx.lock_payment(payment_id).await? {
      if payment.status == PaymentStatus::Pending {
        payment.status = PaymentStatus::Failed;
        payment.gateway_response = Some(format!("Settlement aborted: {reason}"));
        payment.updated_at = Utc::now();
        tx.update_payment(&payment).await?;
      }
    }
    tx.commit().await
  }
  .await;
  match marked {
    Ok(()) => event!(Level::ERROR, %payment_id, %reason, "Settlement aborted; payment marked FAILED."),
    Err(e) => event!(Level::ERROR, %payment_id, %reason, error = %e, "Settlement aborted and the FAILED marker could not be written."),
  }
}

#[instrument(name = "capture::notify_parties", skip_all)]
async fn notify_parties(ctx: ContextData<CaptureCtx>) -> Result<PipelineControl> {
  let (notifier, notifications) = {
    let guard = ctx.read();
    let mut notifications = Vec::new();
    if let (Some(order), Some(payment)) = (guard.order.as_ref(), guard.payment.as_ref()) {
      notifications.push(Notification::new(
        order.buyer_id,
        "Payment Successful",
        format!("Payment of ${} for order {} was successful", payment.amount, order.id),
        NotificationCategory::Payment,
        payment.id,
      ));
      for (seller_id, amount) in &guard.seller_credits {
        notifications.push(Notification::new(
          *seller_id,
          "New Order Payment",
          format!("You earned ${amount} from order {}", order.id),
          NotificationCategory::Order,
          order.id,
        ));
      }
    }
    (guard.deps.notifier.clone(), notifications)
  };

  let sent = notify_all(&notifier, notifications).await;
  ctx.write().notifications_sent = sent;
  Ok(PipelineControl::Continue)
}
