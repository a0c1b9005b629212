// core/src/store/mod.rs

//! Persistence seam for the settlement ledger.
//!
//! Every mutating settlement step opens one [`LedgerTx`], takes the row or
//! seller locks it needs, writes all entity changes and ledger rows, then
//! commits. Dropping a transaction without committing discards its writes.
//! Reads on [`LedgerStore`] itself see committed state only and must not be
//! called while the same task holds an open transaction.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::Result;
use crate::ledger::{
  FinancialTransaction, Order, OrderStatus, Payment, Payout, SellerBalance, SellerEarningsEntry,
};

pub use memory::MemoryLedgerStore;
pub use postgres::PgLedgerStore;

/// Aggregate view over all payments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PaymentStatistics {
  pub total_payments: i64,
  pub pending: i64,
  pub completed: i64,
  pub failed: i64,
  pub refunded: i64,
  pub partially_refunded: i64,
  /// Sum of amounts of every payment that captured money.
  pub gross_volume: Decimal,
  pub commission_earned: Decimal,
  pub refunded_volume: Decimal,
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
  async fn begin(&self) -> Result<Box<dyn LedgerTx>>;

  async fn order(&self, order_id: Uuid) -> Result<Option<Order>>;

  async fn payment(&self, payment_id: Uuid) -> Result<Option<Payment>>;

  async fn payout(&self, payout_id: Uuid) -> Result<Option<Payout>>;

  async fn payments_for_buyer(&self, buyer_id: Uuid) -> Result<Vec<Payment>>;

  async fn payouts_for_seller(&self, seller_id: Uuid) -> Result<Vec<Payout>>;

  async fn ledger_for_payment(&self, payment_id: Uuid) -> Result<Vec<FinancialTransaction>>;

  async fn ledger_for_payout(&self, payout_id: Uuid) -> Result<Vec<FinancialTransaction>>;

  async fn earnings_for_payment(&self, payment_id: Uuid) -> Result<Vec<SellerEarningsEntry>>;

  async fn seller_balance(&self, seller_id: Uuid) -> Result<SellerBalance>;

  /// Every seller that has at least one earnings entry.
  async fn sellers_with_earnings(&self) -> Result<Vec<Uuid>>;

  async fn payment_statistics(&self) -> Result<PaymentStatistics>;
}

/// One atomic unit of settlement work.
#[async_trait]
pub trait LedgerTx: Send {
  /// Loads the order with its items and locks its row until commit.
  async fn lock_order(&mut self, order_id: Uuid) -> Result<Option<Order>>;

  async fn lock_payment(&mut self, payment_id: Uuid) -> Result<Option<Payment>>;

  async fn lock_payout(&mut self, payout_id: Uuid) -> Result<Option<Payout>>;

  /// Serializes payout creation per seller until commit.
  async fn lock_seller(&mut self, seller_id: Uuid) -> Result<()>;

  /// Balance as seen inside this transaction, including its own writes.
  async fn seller_balance(&mut self, seller_id: Uuid) -> Result<SellerBalance>;

  async fn earnings_for_payment(&mut self, payment_id: Uuid) -> Result<Vec<SellerEarningsEntry>>;

  /// Whether any payment for the order ever captured money.
  async fn order_has_captured_payment(&mut self, order_id: Uuid) -> Result<bool>;

  async fn insert_order(&mut self, order: &Order) -> Result<()>;

  async fn update_order_status(&mut self, order_id: Uuid, status: OrderStatus, payment_id: Option<Uuid>) -> Result<()>;

  async fn insert_payment(&mut self, payment: &Payment) -> Result<()>;

  /// Persists `payment` if the stored version still equals `payment.version`,
  /// then bumps the stored version. A mismatch is `SettlementError::Conflict`.
  async fn update_payment(&mut self, payment: &Payment) -> Result<()>;

  async fn insert_payout(&mut self, payout: &Payout) -> Result<()>;

  async fn update_payout(&mut self, payout: &Payout) -> Result<()>;

  async fn append_transaction(&mut self, entry: &FinancialTransaction) -> Result<()>;

  async fn append_earnings(&mut self, entry: &SellerEarningsEntry) -> Result<()>;

  async fn commit(self: Box<Self>) -> Result<()>;
}
