// core/src/service.rs

//! `SettlementService`: the entry point callers use. Each operation builds
//! its pipeline context, runs it through the registry and reads the outcome
//! back out of the context.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{event, instrument, Level};
use uuid::Uuid;

use crate::config::SettlementConfig;
use crate::directory::{Directory, InMemoryDirectory};
use crate::error::{Result, SettlementError};
use crate::gateway::{PaymentGateway, SimulatedGateway};
use crate::ledger::{FinancialTransaction, Order, OrderStatus, Payment, PaymentMethod, Payout};
use crate::notify::{NotificationSink, TracingNotifier};
use crate::order_state::Actor;
use crate::pipelines::{
  register_all_pipelines, CaptureCtx, CreatePayoutCtx, FailPayoutCtx, OrderLine, OrderTransitionCtx, PlaceOrderCtx,
  ProcessPayoutCtx, RefundCtx, SettlementDeps,
};
use crate::results::{PaymentResult, PayoutResult, SellerSummary, SkippedSeller, WeeklyPayoutReport};
use crate::store::{LedgerStore, MemoryLedgerStore, PaymentStatistics};
use crate::workflow::{ContextData, PipelineRegistry, WorkflowError};

pub struct SettlementService {
  deps: SettlementDeps,
  registry: PipelineRegistry<SettlementError>,
}

impl std::fmt::Debug for SettlementService {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SettlementService")
      .field("gateway", &self.deps.gateway.name())
      .field("config", &self.deps.config)
      .finish()
  }
}

fn missing(pipeline: &str, what: &str) -> SettlementError {
  WorkflowError::MissingOutcome {
    pipeline: pipeline.to_string(),
    missing: what.to_string(),
  }
  .into()
}

impl SettlementService {
  pub fn new(
    store: Arc<dyn LedgerStore>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn NotificationSink>,
    directory: Arc<dyn Directory>,
    config: SettlementConfig,
  ) -> Result<Self> {
    config.validate()?;
    let registry = PipelineRegistry::new();
    register_all_pipelines(&registry)?;
    Ok(Self {
      deps: SettlementDeps {
        store,
        gateway,
        notifier,
        directory,
        config: Arc::new(config),
      },
      registry,
    })
  }

  /// In-memory ledger, simulated gateway and log-only notifications.
  pub fn in_memory(config: SettlementConfig, directory: Arc<InMemoryDirectory>) -> Result<Self> {
    let gateway = SimulatedGateway::new(
      config.capture_success_rate,
      config.payout_success_rate,
      config.gateway_latency,
    );
    Self::new(
      Arc::new(MemoryLedgerStore::new()),
      Arc::new(gateway),
      Arc::new(TracingNotifier),
      directory,
      config,
    )
  }

  pub fn config(&self) -> &SettlementConfig {
    &self.deps.config
  }

  #[instrument(skip(self, lines), fields(lines = lines.len()), err(Display))]
  pub async fn place_order(&self, buyer_id: Uuid, lines: Vec<OrderLine>) -> Result<Order> {
    let ctx = ContextData::new(PlaceOrderCtx::new(self.deps.clone(), buyer_id, lines));
    self.registry.run(ctx.clone()).await?;
    let order = ctx.read().order.clone();
    order.ok_or_else(|| missing("place_order", "an order"))
  }

  #[instrument(skip(self), err(Display))]
  pub async fn cancel_order(&self, order_id: Uuid, buyer_id: Uuid) -> Result<Order> {
    self.update_order_status(order_id, OrderStatus::Cancelled, Actor::Buyer(buyer_id)).await
  }

  #[instrument(skip(self), err(Display))]
  pub async fn complete_order(&self, order_id: Uuid, seller_id: Uuid) -> Result<Order> {
    self.update_order_status(order_id, OrderStatus::Completed, Actor::Seller(seller_id)).await
  }

  /// Moves an order along a legal edge on behalf of `actor`.
  #[instrument(skip(self), err(Display))]
  pub async fn update_order_status(&self, order_id: Uuid, target: OrderStatus, actor: Actor) -> Result<Order> {
    let ctx = ContextData::new(OrderTransitionCtx::new(self.deps.clone(), order_id, target, actor));
    self.registry.run(ctx.clone()).await?;
    let order = ctx.read().order.clone();
    order.ok_or_else(|| missing("order_transition", "an order"))
  }

  /// Captures payment for a PENDING order. A gateway decline is a normal
  /// result with status FAILED; validation problems are errors.
  #[instrument(skip(self), err(Display))]
  pub async fn capture(&self, order_id: Uuid, buyer_id: Uuid, method: PaymentMethod) -> Result<PaymentResult> {
    let ctx = ContextData::new(CaptureCtx::new(self.deps.clone(), order_id, buyer_id, method));
    self.registry.run(ctx.clone()).await?;
    let result = ctx.read().result.clone();
    let result = result.ok_or_else(|| missing("capture_payment", "a payment result"))?;
    event!(Level::INFO, payment_id = %result.payment_id, status = %result.status, "Capture finished.");
    Ok(result)
  }

  #[instrument(skip(self), err(Display))]
  pub async fn refund(&self, payment_id: Uuid, amount: Decimal, reason: &str) -> Result<PaymentResult> {
    let ctx = ContextData::new(RefundCtx::new(self.deps.clone(), payment_id, amount, reason.to_string()));
    self.registry.run(ctx.clone()).await?;
    let result = ctx.read().result.clone();
    result.ok_or_else(|| missing("refund_payment", "a payment result"))
  }

  /// Reserves `amount` of the seller's pending earnings as a PENDING payout.
  #[instrument(skip(self), err(Display))]
  pub async fn request_payout(&self, seller_id: Uuid, amount: Decimal, method: &str) -> Result<PayoutResult> {
    let ctx = ContextData::new(CreatePayoutCtx::new(self.deps.clone(), seller_id, amount, method.to_string()));
    self.registry.run(ctx.clone()).await?;
    let guard = ctx.read();
    let payout = guard.payout.clone().ok_or_else(|| missing("create_payout", "a payout"))?;
    Ok(PayoutResult {
      message: format!("Payout {} requested", payout.payout_reference),
      remaining_earnings: guard.remaining_earnings,
      payout,
    })
  }

  /// Returns whether the payout was disbursed. A payout that is not PENDING
  /// is left untouched and reported as not processed.
  #[instrument(skip(self), err(Display))]
  pub async fn process_payout(&self, payout_id: Uuid) -> Result<bool> {
    let ctx = ContextData::new(ProcessPayoutCtx::new(self.deps.clone(), payout_id));
    self.registry.run(ctx.clone()).await?;
    let processed = ctx.read().processed;
    Ok(processed)
  }

  /// Operator recovery for a payout left PROCESSING when finalization never
  /// committed. The payout becomes FAILED and its reservation is released.
  #[instrument(skip(self), err(Display))]
  pub async fn fail_stuck_payout(&self, payout_id: Uuid, reason: &str) -> Result<Payout> {
    let ctx = ContextData::new(FailPayoutCtx::new(self.deps.clone(), payout_id, reason.to_string()));
    self.registry.run(ctx.clone()).await?;
    let payout = ctx.read().payout.clone();
    payout.ok_or_else(|| missing("fail_stuck_payout", "a payout"))
  }

  #[instrument(skip(self), err(Display))]
  pub async fn pending_earnings(&self, seller_id: Uuid) -> Result<Decimal> {
    Ok(self.deps.store.seller_balance(seller_id).await?.available())
  }

  #[instrument(skip(self), err(Display))]
  pub async fn seller_summary(&self, seller_id: Uuid) -> Result<SellerSummary> {
    Ok(self.deps.store.seller_balance(seller_id).await?.into())
  }

  /// Creates one payout for every seller whose pending earnings reach the
  /// configured minimum. Per-seller failures are reported, not raised.
  #[instrument(skip(self), err(Display))]
  pub async fn run_weekly_payouts(&self) -> Result<WeeklyPayoutReport> {
    let minimum = self.deps.config.payout_minimum;
    let mut report = WeeklyPayoutReport::default();

    for seller_id in self.deps.store.sellers_with_earnings().await? {
      let available = self.pending_earnings(seller_id).await?;
      if available < minimum {
        if available > Decimal::ZERO {
          report.skipped.push(SkippedSeller {
            seller_id,
            reason: format!("pending earnings {available} below minimum {minimum}"),
          });
        }
        continue;
      }

      let method = match self.deps.directory.seller(seller_id).await? {
        Some(account) => account
          .default_payout_method
          .unwrap_or_else(|| self.deps.config.default_payout_method.clone()),
        None => self.deps.config.default_payout_method.clone(),
      };

      match self.request_payout(seller_id, available, &method).await {
        Ok(result) => report.created.push(result.payout),
        Err(e) => {
          event!(Level::WARN, %seller_id, error = %e, "Weekly payout skipped.");
          report.skipped.push(SkippedSeller {
            seller_id,
            reason: e.to_string(),
          });
        }
      }
    }

    event!(Level::INFO, created = report.created.len(), skipped = report.skipped.len(), "Weekly payout run finished.");
    Ok(report)
  }

  pub async fn order(&self, order_id: Uuid) -> Result<Order> {
    self
      .deps
      .store
      .order(order_id)
      .await?
      .ok_or_else(|| SettlementError::not_found(format!("order {order_id}")))
  }

  pub async fn payment(&self, payment_id: Uuid) -> Result<Payment> {
    self
      .deps
      .store
      .payment(payment_id)
      .await?
      .ok_or_else(|| SettlementError::not_found(format!("payment {payment_id}")))
  }

  pub async fn payout(&self, payout_id: Uuid) -> Result<Payout> {
    self
      .deps
      .store
      .payout(payout_id)
      .await?
      .ok_or_else(|| SettlementError::not_found(format!("payout {payout_id}")))
  }

  pub async fn payments_for_buyer(&self, buyer_id: Uuid) -> Result<Vec<Payment>> {
    self.deps.store.payments_for_buyer(buyer_id).await
  }

  pub async fn payouts_for_seller(&self, seller_id: Uuid) -> Result<Vec<Payout>> {
    self.deps.store.payouts_for_seller(seller_id).await
  }

  pub async fn ledger_for_payment(&self, payment_id: Uuid) -> Result<Vec<FinancialTransaction>> {
    self.deps.store.ledger_for_payment(payment_id).await
  }

  pub async fn ledger_for_payout(&self, payout_id: Uuid) -> Result<Vec<FinancialTransaction>> {
    self.deps.store.ledger_for_payout(payout_id).await
  }

  pub async fn payment_statistics(&self) -> Result<PaymentStatistics> {
    self.deps.store.payment_statistics().await
  }
}
