// core/src/pipelines/contexts.rs

//! Context data for each settlement pipeline. Handlers receive these
//! wrapped in `ContextData`.

use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::SettlementConfig;
use crate::directory::Directory;
use crate::gateway::{GatewayOutcome, PaymentGateway};
use crate::ledger::{Order, OrderItem, OrderStatus, Payment, PaymentMethod, Payout};
use crate::notify::NotificationSink;
use crate::order_state::Actor;
use crate::results::PaymentResult;
use crate::store::LedgerStore;

/// Collaborators every pipeline reaches through its context.
#[derive(Clone)]
pub struct SettlementDeps {
  pub store: Arc<dyn LedgerStore>,
  pub gateway: Arc<dyn PaymentGateway>,
  pub notifier: Arc<dyn NotificationSink>,
  pub directory: Arc<dyn Directory>,
  pub config: Arc<SettlementConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct OrderLine {
  pub product_id: Uuid,
  pub quantity: i32,
}

pub struct PlaceOrderCtx {
  pub deps: SettlementDeps,
  pub buyer_id: Uuid,
  pub lines: Vec<OrderLine>,
  pub items: Vec<OrderItem>,
  pub order: Option<Order>,
  pub notifications_sent: usize,
}

pub struct OrderTransitionCtx {
  pub deps: SettlementDeps,
  pub order_id: Uuid,
  pub target: OrderStatus,
  pub actor: Actor,
  pub order: Option<Order>,
  pub notifications_sent: usize,
}

pub struct CaptureCtx {
  pub deps: SettlementDeps,
  pub order_id: Uuid,
  pub buyer_id: Uuid,
  pub method: PaymentMethod,
  pub order: Option<Order>,
  pub payment: Option<Payment>,
  pub gateway_outcome: Option<GatewayOutcome>,
  /// Seller credits written at settlement, in seller id order.
  pub seller_credits: Vec<(Uuid, Decimal)>,
  pub result: Option<PaymentResult>,
  pub notifications_sent: usize,
}

pub struct RefundCtx {
  pub deps: SettlementDeps,
  pub payment_id: Uuid,
  pub amount: Decimal,
  pub reason: String,
  pub payment: Option<Payment>,
  pub seller_debits: Vec<(Uuid, Decimal)>,
  pub result: Option<PaymentResult>,
  pub notifications_sent: usize,
}

pub struct CreatePayoutCtx {
  pub deps: SettlementDeps,
  pub seller_id: Uuid,
  pub amount: Decimal,
  pub method: String,
  pub transaction_fee: Decimal,
  pub payout: Option<Payout>,
  pub remaining_earnings: Decimal,
  pub notifications_sent: usize,
}

pub struct ProcessPayoutCtx {
  pub deps: SettlementDeps,
  pub payout_id: Uuid,
  pub payout: Option<Payout>,
  pub outcome: Option<GatewayOutcome>,
  pub processed: bool,
  pub notifications_sent: usize,
}

pub struct FailPayoutCtx {
  pub deps: SettlementDeps,
  pub payout_id: Uuid,
  pub reason: String,
  pub payout: Option<Payout>,
  pub notifications_sent: usize,
}

impl PlaceOrderCtx {
  pub fn new(deps: SettlementDeps, buyer_id: Uuid, lines: Vec<OrderLine>) -> Self {
    Self {
      deps,
      buyer_id,
      lines,
      items: Vec::new(),
      order: None,
      notifications_sent: 0,
    }
  }
}

impl OrderTransitionCtx {
  pub fn new(deps: SettlementDeps, order_id: Uuid, target: OrderStatus, actor: Actor) -> Self {
    Self {
      deps,
      order_id,
      target,
      actor,
      order: None,
      notifications_sent: 0,
    }
  }
}

impl CaptureCtx {
  pub fn new(deps: SettlementDeps, order_id: Uuid, buyer_id: Uuid, method: PaymentMethod) -> Self {
    Self {
      deps,
      order_id,
      buyer_id,
      method,
      order: None,
      payment: None,
      gateway_outcome: None,
      seller_credits: Vec::new(),
      result: None,
      notifications_sent: 0,
    }
  }
}

impl RefundCtx {
  pub fn new(deps: SettlementDeps, payment_id: Uuid, amount: Decimal, reason: String) -> Self {
    Self {
      deps,
      payment_id,
      amount,
      reason,
      payment: None,
      seller_debits: Vec::new(),
      result: None,
      notifications_sent: 0,
    }
  }
}

impl CreatePayoutCtx {
  pub fn new(deps: SettlementDeps, seller_id: Uuid, amount: Decimal, method: String) -> Self {
    Self {
      deps,
      seller_id,
      amount,
      method,
      transaction_fee: Decimal::ZERO,
      payout: None,
      remaining_earnings: Decimal::ZERO,
      notifications_sent: 0,
    }
  }
}

impl ProcessPayoutCtx {
  pub fn new(deps: SettlementDeps, payout_id: Uuid) -> Self {
    Self {
      deps,
      payout_id,
      payout: None,
      outcome: None,
      processed: false,
      notifications_sent: 0,
    }
  }
}

impl FailPayoutCtx {
  pub fn new(deps: SettlementDeps, payout_id: Uuid, reason: String) -> Self {
    Self {
      deps,
      payout_id,
      reason,
      payout: None,
      notifications_sent: 0,
    }
  }
}
