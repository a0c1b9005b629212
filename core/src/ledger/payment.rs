// core/src/ledger/payment.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type as SqlxType};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "payment_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
  Pending,
  Completed,
  Failed,
  Refunded,
  PartiallyRefunded,
}

impl PaymentStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      PaymentStatus::Pending => "PENDING",
      PaymentStatus::Completed => "COMPLETED",
      PaymentStatus::Failed => "FAILED",
      PaymentStatus::Refunded => "REFUNDED",
      PaymentStatus::PartiallyRefunded => "PARTIALLY_REFUNDED",
    }
  }

  /// Money was captured for this payment at some point.
  pub fn was_captured(&self) -> bool {
    matches!(
      self,
      PaymentStatus::Completed | PaymentStatus::PartiallyRefunded | PaymentStatus::Refunded
    )
  }

  pub fn is_refundable(&self) -> bool {
    matches!(self, PaymentStatus::Completed | PaymentStatus::PartiallyRefunded)
  }
}

impl std::fmt::Display for PaymentStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "payment_method", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
  CreditCard,
  BankTransfer,
  BankSlip,
  Paypal,
}

impl PaymentMethod {
  pub fn as_str(&self) -> &'static str {
    match self {
      PaymentMethod::CreditCard => "CREDIT_CARD",
      PaymentMethod::BankTransfer => "BANK_TRANSFER",
      PaymentMethod::BankSlip => "BANK_SLIP",
      PaymentMethod::Paypal => "PAYPAL",
    }
  }
}

impl std::fmt::Display for PaymentMethod {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for PaymentMethod {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_uppercase().as_str() {
      "CREDIT_CARD" => Ok(PaymentMethod::CreditCard),
      "BANK_TRANSFER" => Ok(PaymentMethod::BankTransfer),
      "BANK_SLIP" => Ok(PaymentMethod::BankSlip),
      "PAYPAL" => Ok(PaymentMethod::Paypal),
      other => Err(format!("unsupported payment method '{other}'")),
    }
  }
}

/// One capture attempt for an order.
///
/// `amount` is fixed at creation. `commission_amount` and `seller_earnings`
/// are derived from `amount` and `commission_rate` by `commission::recompute`.
/// `version` increments on every persisted update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Payment {
  pub id: Uuid,
  pub order_id: Uuid,
  pub buyer_id: Uuid,
  pub amount: Decimal,
  pub status: PaymentStatus,
  pub payment_method: PaymentMethod,
  pub transaction_id: String,
  pub payment_gateway: String,
  pub gateway_response: Option<String>,
  pub commission_rate: Decimal,
  pub commission_amount: Decimal,
  pub seller_earnings: Decimal,
  pub refunded_amount: Decimal,
  pub version: i32,
  pub payment_date: Option<DateTime<Utc>>,
  pub refund_date: Option<DateTime<Utc>>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Payment {
  pub fn remaining_refundable(&self) -> Decimal {
    self.amount - self.refunded_amount
  }
}
