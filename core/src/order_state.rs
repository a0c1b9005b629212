// core/src/order_state.rs

//! The one place order status is allowed to change.
//!
//! ```text
//! PENDING --(payment captured, system)--> CONFIRMED --(seller fulfils)--> COMPLETED
//!    \--(buyer cancels, nothing captured)--> CANCELLED
//! ```

use crate::error::{Result, SettlementError};
use crate::ledger::{Order, OrderStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who is asking for the status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", content = "id", rename_all = "snake_case")]
pub enum Actor {
  Buyer(Uuid),
  Seller(Uuid),
  /// The payment processor.
  System,
  /// The administrative update path; still bound by the edge table.
  Admin,
}

pub fn is_legal_edge(from: OrderStatus, to: OrderStatus) -> bool {
  matches!(
    (from, to),
    (OrderStatus::Pending, OrderStatus::Confirmed)
      | (OrderStatus::Confirmed, OrderStatus::Completed)
      | (OrderStatus::Pending, OrderStatus::Cancelled)
  )
}

/// Validates `order.status -> target` for `actor` and returns the new status.
///
/// `payment_captured` tells whether any payment for the order ever captured
/// money; cancellation is refused once it has.
pub fn transition(order: &Order, target: OrderStatus, actor: Actor, payment_captured: bool) -> Result<OrderStatus> {
  let from = order.status;
  if !is_legal_edge(from, target) {
    return Err(SettlementError::validation(format!(
      "order {} cannot move from {from} to {target}",
      order.id
    )));
  }

  let permitted = match (target, actor) {
    (OrderStatus::Confirmed, Actor::System) => true,
    (OrderStatus::Completed, Actor::Seller(seller_id)) => order.contains_seller(seller_id),
    (OrderStatus::Completed, Actor::Admin) => true,
    (OrderStatus::Cancelled, Actor::Buyer(buyer_id)) => order.buyer_id == buyer_id,
    (OrderStatus::Cancelled, Actor::Admin) => true,
    _ => false,
  };
  if !permitted {
    return Err(SettlementError::validation(format!(
      "{actor:?} is not allowed to move order {} to {target}",
      order.id
    )));
  }

  if target == OrderStatus::Cancelled && payment_captured {
    return Err(SettlementError::validation(format!(
      "order {} has a captured payment and cannot be cancelled",
      order.id
    )));
  }

  Ok(target)
}
