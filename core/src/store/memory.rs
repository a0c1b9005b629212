// core/src/store/memory.rs

//! Process-local ledger store.
//!
//! A transaction holds the store-wide mutex from `begin` to commit or drop
//! and works on a private copy of the state that replaces the shared state
//! on commit. This gives every transaction full isolation and makes each
//! settlement step all-or-nothing, at the price of running them one at a time.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{LedgerStore, LedgerTx, PaymentStatistics};
use crate::error::{Result, SettlementError};
use crate::ledger::{
  EarningsKind, FinancialTransaction, Order, OrderStatus, Payment, PaymentStatus, Payout, PayoutStatus, SellerBalance,
  SellerEarningsEntry,
};

#[derive(Debug, Clone, Default)]
struct LedgerState {
  orders: HashMap<Uuid, Order>,
  payments: HashMap<Uuid, Payment>,
  payouts: HashMap<Uuid, Payout>,
  transactions: Vec<FinancialTransaction>,
  earnings: Vec<SellerEarningsEntry>,
}

impl LedgerState {
  fn seller_balance(&self, seller_id: Uuid) -> SellerBalance {
    let mut balance = SellerBalance {
      seller_id,
      ..SellerBalance::default()
    };
    let mut credited_payments = BTreeSet::new();
    for entry in self.earnings.iter().filter(|e| e.seller_id == seller_id) {
      match entry.kind {
        EarningsKind::Credit => {
          balance.credited += entry.amount;
          credited_payments.insert(entry.payment_id);
        }
        EarningsKind::Debit => balance.debited += entry.amount,
      }
    }
    balance.order_count = credited_payments.len() as i64;
    for payout in self.payouts.values().filter(|p| p.seller_id == seller_id) {
      match payout.status {
        PayoutStatus::Pending | PayoutStatus::Processing => balance.reserved += payout.amount,
        PayoutStatus::Completed => balance.paid_out += payout.amount,
        PayoutStatus::Failed => {}
      }
    }
    balance
  }

  fn earnings_for_payment(&self, payment_id: Uuid) -> Vec<SellerEarningsEntry> {
    self
      .earnings
      .iter()
      .filter(|e| e.payment_id == payment_id)
      .cloned()
      .collect()
  }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryLedgerStore {
  state: Arc<Mutex<LedgerState>>,
}

impl MemoryLedgerStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
  async fn begin(&self) -> Result<Box<dyn LedgerTx>> {
    let guard = self.state.clone().lock_owned().await;
    let working = (*guard).clone();
    Ok(Box::new(MemoryTx { guard, working }))
  }

  async fn order(&self, order_id: Uuid) -> Result<Option<Order>> {
    Ok(self.state.lock().await.orders.get(&order_id).cloned())
  }

  async fn payment(&self, payment_id: Uuid) -> Result<Option<Payment>> {
    Ok(self.state.lock().await.payments.get(&payment_id).cloned())
  }

  async fn payout(&self, payout_id: Uuid) -> Result<Option<Payout>> {
    Ok(self.state.lock().await.payouts.get(&payout_id).cloned())
  }

  async fn payments_for_buyer(&self, buyer_id: Uuid) -> Result<Vec<Payment>> {
    let state = self.state.lock().await;
    let mut payments: Vec<Payment> = state.payments.values().filter(|p| p.buyer_id == buyer_id).cloned().collect();
    payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(payments)
  }

  async fn payouts_for_seller(&self, seller_id: Uuid) -> Result<Vec<Payout>> {
    let state = self.state.lock().await;
    let mut payouts: Vec<Payout> = state.payouts.values().filter(|p| p.seller_id == seller_id).cloned().collect();
    payouts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(payouts)
  }

  async fn ledger_for_payment(&self, payment_id: Uuid) -> Result<Vec<FinancialTransaction>> {
    let state = self.state.lock().await;
    Ok(
      state
        .transactions
        .iter()
        .filter(|t| t.payment_id == Some(payment_id))
        .cloned()
        .collect(),
    )
  }

  async fn ledger_for_payout(&self, payout_id: Uuid) -> Result<Vec<FinancialTransaction>> {
    let state = self.state.lock().await;
    Ok(
      state
        .transactions
        .iter()
        .filter(|t| t.payout_id == Some(payout_id))
        .cloned()
        .collect(),
    )
  }

  async fn earnings_for_payment(&self, payment_id: Uuid) -> Result<Vec<SellerEarningsEntry>> {
    Ok(self.state.lock().await.earnings_for_payment(payment_id))
  }

  async fn seller_balance(&self, seller_id: Uuid) -> Result<SellerBalance> {
    Ok(self.state.lock().await.seller_balance(seller_id))
  }

  async fn sellers_with_earnings(&self) -> Result<Vec<Uuid>> {
    let state = self.state.lock().await;
    let sellers: BTreeSet<Uuid> = state.earnings.iter().map(|e| e.seller_id).collect();
    Ok(sellers.into_iter().collect())
  }

  async fn payment_statistics(&self) -> Result<PaymentStatistics> {
    let state = self.state.lock().await;
    let mut stats = PaymentStatistics::default();
    for payment in state.payments.values() {
      stats.total_payments += 1;
      match payment.status {
        PaymentStatus::Pending => stats.pending += 1,
        PaymentStatus::Completed => stats.completed += 1,
        PaymentStatus::Failed => stats.failed += 1,
        PaymentStatus::Refunded => stats.refunded += 1,
        PaymentStatus::PartiallyRefunded => stats.partially_refunded += 1,
      }
      if payment.status.was_captured() {
        stats.gross_volume += payment.amount;
        stats.commission_earned += payment.commission_amount;
        stats.refunded_volume += payment.refunded_amount;
      }
    }
    Ok(stats)
  }
}

struct MemoryTx {
  guard: OwnedMutexGuard<LedgerState>,
  working: LedgerState,
}

impl MemoryTx {
  fn missing(kind: &str, id: Uuid) -> SettlementError {
    SettlementError::not_found(format!("{kind} {id} does not exist"))
  }
}

#[async_trait]
impl LedgerTx for MemoryTx {
  async fn lock_order(&mut self, order_id: Uuid) -> Result<Option<Order>> {
    Ok(self.working.orders.get(&order_id).cloned())
  }

  async fn lock_payment(&mut self, payment_id: Uuid) -> Result<Option<Payment>> {
    Ok(self.working.payments.get(&payment_id).cloned())
  }

  async fn lock_payout(&mut self, payout_id: Uuid) -> Result<Option<Payout>> {
    Ok(self.working.payouts.get(&payout_id).cloned())
  }

  async fn lock_seller(&mut self, _seller_id: Uuid) -> Result<()> {
    // The store-wide guard already serializes every transaction.
    Ok(())
  }

  async fn seller_balance(&mut self, seller_id: Uuid) -> Result<SellerBalance> {
    Ok(self.working.seller_balance(seller_id))
  }

  async fn earnings_for_payment(&mut self, payment_id: Uuid) -> Result<Vec<SellerEarningsEntry>> {
    Ok(self.working.earnings_for_payment(payment_id))
  }

  async fn order_has_captured_payment(&mut self, order_id: Uuid) -> Result<bool> {
    Ok(
      self
        .working
        .payments
        .values()
        .any(|p| p.order_id == order_id && p.status.was_captured()),
    )
  }

  async fn insert_order(&mut self, order: &Order) -> Result<()> {
    if self.working.orders.contains_key(&order.id) {
      return Err(SettlementError::Conflict(format!("order {} already exists", order.id)));
    }
    self.working.orders.insert(order.id, order.clone());
    Ok(())
  }

  async fn update_order_status(&mut self, order_id: Uuid, status: OrderStatus, payment_id: Option<Uuid>) -> Result<()> {
    let order = self
      .working
      .orders
      .get_mut(&order_id)
      .ok_or_else(|| Self::missing("order", order_id))?;
    order.status = status;
    if payment_id.is_some() {
      order.payment_id = payment_id;
    }
    order.updated_at = chrono::Utc::now();
    Ok(())
  }

  async fn insert_payment(&mut self, payment: &Payment) -> Result<()> {
    let duplicate_txn = self
      .working
      .payments
      .values()
      .any(|p| p.transaction_id == payment.transaction_id);
    if self.working.payments.contains_key(&payment.id) || duplicate_txn {
      return Err(SettlementError::Conflict(format!(
        "payment {} / {} already exists",
        payment.id, payment.transaction_id
      )));
    }
    self.working.payments.insert(payment.id, payment.clone());
    Ok(())
  }

  async fn update_payment(&mut self, payment: &Payment) -> Result<()> {
    let stored = self
      .working
      .payments
      .get_mut(&payment.id)
      .ok_or_else(|| Self::missing("payment", payment.id))?;
    if stored.version != payment.version {
      return Err(SettlementError::Conflict(format!(
        "payment {} was modified concurrently (expected version {}, found {})",
        payment.id, payment.version, stored.version
      )));
    }
    *stored = Payment {
      version: payment.version + 1,
      updated_at: chrono::Utc::now(),
      ..payment.clone()
    };
    Ok(())
  }

  async fn insert_payout(&mut self, payout: &Payout) -> Result<()> {
    let duplicate_ref = self
      .working
      .payouts
      .values()
      .any(|p| p.payout_reference == payout.payout_reference);
    if self.working.payouts.contains_key(&payout.id) || duplicate_ref {
      return Err(SettlementError::Conflict(format!(
        "payout {} / {} already exists",
        payout.id, payout.payout_reference
      )));
    }
    self.working.payouts.insert(payout.id, payout.clone());
    Ok(())
  }

  async fn update_payout(&mut self, payout: &Payout) -> Result<()> {
    let stored = self
      .working
      .payouts
      .get_mut(&payout.id)
      .ok_or_else(|| Self::missing("payout", payout.id))?;
    *stored = Payout {
      updated_at: chrono::Utc::now(),
      ..payout.clone()
    };
    Ok(())
  }

  async fn append_transaction(&mut self, entry: &FinancialTransaction) -> Result<()> {
    self.working.transactions.push(entry.clone());
    Ok(())
  }

  async fn append_earnings(&mut self, entry: &SellerEarningsEntry) -> Result<()> {
    if entry.amount < Decimal::ZERO {
      return Err(SettlementError::consistency("earnings entries carry positive amounts"));
    }
    self.working.earnings.push(entry.clone());
    Ok(())
  }

  async fn commit(self: Box<Self>) -> Result<()> {
    let MemoryTx { mut guard, working } = *self;
    *guard = working;
    Ok(())
  }
}
