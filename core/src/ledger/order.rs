// core/src/ledger/order.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type as SqlxType};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "order_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
  Pending,
  Confirmed,
  Cancelled,
  Completed,
}

impl OrderStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      OrderStatus::Pending => "PENDING",
      OrderStatus::Confirmed => "CONFIRMED",
      OrderStatus::Cancelled => "CANCELLED",
      OrderStatus::Completed => "COMPLETED",
    }
  }
}

impl std::fmt::Display for OrderStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Line item snapshot taken at purchase time; never updated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct OrderItem {
  pub id: Uuid,
  pub order_id: Uuid,
  pub product_id: Uuid,
  pub seller_id: Uuid,
  pub title: String,
  pub quantity: i32,
  pub unit_price: Decimal,
}

impl OrderItem {
  pub fn subtotal(&self) -> Decimal {
    self.unit_price * Decimal::from(self.quantity)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Order {
  pub id: Uuid,
  pub buyer_id: Uuid,
  pub total_amount: Decimal,
  pub status: OrderStatus,
  pub payment_id: Option<Uuid>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  #[sqlx(skip)]
  pub items: Vec<OrderItem>,
}

impl Order {
  /// Sum of the item subtotals.
  pub fn items_total(items: &[OrderItem]) -> Decimal {
    items.iter().map(OrderItem::subtotal).sum()
  }

  /// Per-seller subtotal, ordered by seller id so callers get a stable order.
  pub fn seller_subtotals(&self) -> BTreeMap<Uuid, Decimal> {
    let mut subtotals = BTreeMap::new();
    for item in &self.items {
      *subtotals.entry(item.seller_id).or_insert(Decimal::ZERO) += item.subtotal();
    }
    subtotals
  }

  pub fn seller_ids(&self) -> Vec<Uuid> {
    self.seller_subtotals().into_keys().collect()
  }

  pub fn contains_seller(&self, seller_id: Uuid) -> bool {
    self.items.iter().any(|item| item.seller_id == seller_id)
  }

  pub fn is_paid(&self) -> bool {
    matches!(self.status, OrderStatus::Confirmed | OrderStatus::Completed)
  }

  /// A paid order whose payment link is set; the payment's own status
  /// decides how much is still refundable.
  pub fn can_be_refunded(&self) -> bool {
    self.is_paid() && self.payment_id.is_some()
  }

  pub fn total_matches_items(&self) -> bool {
    self.total_amount == Self::items_total(&self.items)
  }
}
