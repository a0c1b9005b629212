// core/src/results.rs

//! What settlement operations hand back to their callers.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ledger::{Payment, PaymentStatus, Payout, SellerBalance};

/// Outcome of a capture or refund. A declined capture is a normal result
/// with `status == FAILED` and `retryable == true`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentResult {
  pub status: PaymentStatus,
  pub payment_id: Uuid,
  pub order_id: Uuid,
  pub amount: Decimal,
  pub refunded_amount: Decimal,
  pub retryable: bool,
  pub message: String,
}

impl PaymentResult {
  pub fn from_payment(payment: &Payment, retryable: bool, message: impl Into<String>) -> Self {
    Self {
      status: payment.status,
      payment_id: payment.id,
      order_id: payment.order_id,
      amount: payment.amount,
      refunded_amount: payment.refunded_amount,
      retryable,
      message: message.into(),
    }
  }

  pub fn succeeded(&self) -> bool {
    self.status != PaymentStatus::Failed && self.status != PaymentStatus::Pending
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutResult {
  pub payout: Payout,
  /// Seller's withdrawable balance once this payout's amount is reserved.
  pub remaining_earnings: Decimal,
  pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedSeller {
  pub seller_id: Uuid,
  pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeeklyPayoutReport {
  pub created: Vec<Payout>,
  pub skipped: Vec<SkippedSeller>,
}

/// Read model of a seller's earnings, computed from the sub-ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellerSummary {
  pub seller_id: Uuid,
  pub total_revenue: Decimal,
  pub order_count: i64,
  pub reserved: Decimal,
  pub paid_out: Decimal,
  pub pending_earnings: Decimal,
  pub outstanding_debt: Decimal,
}

impl From<SellerBalance> for SellerSummary {
  fn from(balance: SellerBalance) -> Self {
    Self {
      seller_id: balance.seller_id,
      total_revenue: balance.total_revenue(),
      order_count: balance.order_count,
      reserved: balance.reserved,
      paid_out: balance.paid_out,
      pending_earnings: balance.available(),
      outstanding_debt: balance.outstanding_debt(),
    }
  }
}
