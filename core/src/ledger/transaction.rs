// core/src/ledger/transaction.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type as SqlxType};
use uuid::Uuid;

use crate::money::CURRENCY;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "transaction_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
  Payment,
  Refund,
  Payout,
  Commission,
  Fee,
  Adjustment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "transaction_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
  Pending,
  Completed,
  Failed,
  Cancelled,
}

/// Append-only audit row. Amounts are signed relative to `user_id`:
/// money leaving that user's balance is negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct FinancialTransaction {
  pub id: Uuid,
  pub transaction_type: TransactionType,
  pub amount: Decimal,
  pub currency: String,
  pub user_id: Uuid,
  pub payment_id: Option<Uuid>,
  pub payout_id: Option<Uuid>,
  pub description: String,
  pub reference_id: Option<String>,
  pub status: TransactionStatus,
  pub transaction_date: DateTime<Utc>,
}

impl FinancialTransaction {
  fn completed(transaction_type: TransactionType, amount: Decimal, user_id: Uuid, description: String) -> Self {
    Self {
      id: Uuid::new_v4(),
      transaction_type,
      amount,
      currency: CURRENCY.to_string(),
      user_id,
      payment_id: None,
      payout_id: None,
      description,
      reference_id: None,
      status: TransactionStatus::Completed,
      transaction_date: Utc::now(),
    }
  }

  /// A row tied to a payment (PAYMENT or REFUND).
  pub fn for_payment(
    transaction_type: TransactionType,
    amount: Decimal,
    user_id: Uuid,
    payment_id: Uuid,
    reference_id: &str,
    description: String,
  ) -> Self {
    Self {
      payment_id: Some(payment_id),
      reference_id: Some(reference_id.to_string()),
      ..Self::completed(transaction_type, amount, user_id, description)
    }
  }

  /// A row tied to a payout (PAYOUT or FEE).
  pub fn for_payout(
    transaction_type: TransactionType,
    amount: Decimal,
    user_id: Uuid,
    payout_id: Uuid,
    reference_id: &str,
    description: String,
  ) -> Self {
    Self {
      payout_id: Some(payout_id),
      reference_id: Some(reference_id.to_string()),
      ..Self::completed(transaction_type, amount, user_id, description)
    }
  }
}
