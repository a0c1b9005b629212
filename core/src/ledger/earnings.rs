// core/src/ledger/earnings.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type as SqlxType};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "earnings_kind", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EarningsKind {
  Credit,
  Debit,
}

/// A seller's share of one capture (CREDIT) or one refund (DEBIT).
/// `amount` is always positive; `kind` carries the direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SellerEarningsEntry {
  pub id: Uuid,
  pub seller_id: Uuid,
  pub payment_id: Uuid,
  pub order_id: Uuid,
  pub kind: EarningsKind,
  pub amount: Decimal,
  pub created_at: DateTime<Utc>,
}

impl SellerEarningsEntry {
  pub fn new(seller_id: Uuid, payment_id: Uuid, order_id: Uuid, kind: EarningsKind, amount: Decimal) -> Self {
    Self {
      id: Uuid::new_v4(),
      seller_id,
      payment_id,
      order_id,
      kind,
      amount,
      created_at: Utc::now(),
    }
  }
}

/// Aggregates over a seller's earnings sub-ledger and payouts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SellerBalance {
  pub seller_id: Uuid,
  pub credited: Decimal,
  pub debited: Decimal,
  /// Payouts still PENDING or PROCESSING.
  pub reserved: Decimal,
  /// Payouts COMPLETED.
  pub paid_out: Decimal,
  /// Distinct payments that credited this seller.
  pub order_count: i64,
}

impl SellerBalance {
  /// Earnings kept after refunds.
  pub fn total_revenue(&self) -> Decimal {
    self.credited - self.debited
  }

  /// Unclamped balance; negative means refunds exceeded what is left and the
  /// seller carries a debt into future earnings.
  pub fn net(&self) -> Decimal {
    self.credited - self.debited - self.reserved - self.paid_out
  }

  /// What the seller may still withdraw, never below zero.
  pub fn available(&self) -> Decimal {
    self.net().max(Decimal::ZERO)
  }

  pub fn outstanding_debt(&self) -> Decimal {
    (-self.net()).max(Decimal::ZERO)
  }
}
