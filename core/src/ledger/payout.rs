// core/src/ledger/payout.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type as SqlxType};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "payout_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayoutStatus {
  Pending,
  Processing,
  Completed,
  Failed,
}

impl PayoutStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      PayoutStatus::Pending => "PENDING",
      PayoutStatus::Processing => "PROCESSING",
      PayoutStatus::Completed => "COMPLETED",
      PayoutStatus::Failed => "FAILED",
    }
  }

  /// Statuses whose amount is held against the seller's earnings.
  pub fn holds_earnings(&self) -> bool {
    !matches!(self, PayoutStatus::Failed)
  }
}

impl std::fmt::Display for PayoutStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Payout {
  pub id: Uuid,
  pub seller_id: Uuid,
  pub amount: Decimal,
  pub transaction_fee: Decimal,
  pub net_amount: Decimal,
  pub status: PayoutStatus,
  pub payout_method: String,
  pub payout_reference: String,
  pub failure_reason: Option<String>,
  pub period_start: NaiveDate,
  pub period_end: NaiveDate,
  pub estimated_arrival: NaiveDate,
  pub processed_date: Option<DateTime<Utc>>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}
