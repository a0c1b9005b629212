// core/src/pipelines/orders.rs

//! Order placement and buyer/seller/admin status changes.

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{event, instrument, Level};
use uuid::Uuid;

use super::common_steps::notify_all;
use super::contexts::{OrderTransitionCtx, PlaceOrderCtx};
use crate::error::{Result, SettlementError};
use crate::ledger::{Order, OrderItem, OrderStatus};
use crate::notify::{Notification, NotificationCategory};
use crate::order_state;
use crate::workflow::{ContextData, Pipeline, PipelineControl, PipelineRegistry, WorkflowError};

pub const PLACE_ORDER_PIPELINE: &str = "place_order";
pub const ORDER_TRANSITION_PIPELINE: &str = "order_transition";

/// Upper bound on a single line's quantity.
pub const MAX_LINE_QUANTITY: i32 = 10_000;

pub fn place_order_pipeline() -> Pipeline<PlaceOrderCtx, SettlementError> {
  let mut p = Pipeline::<PlaceOrderCtx, SettlementError>::new(
    PLACE_ORDER_PIPELINE,
    &[
      ("validate_lines", false, None),
      ("snapshot_items", false, None),
      ("persist_order", false, None),
      ("notify_parties", true, None),
    ],
  );
  p.on_root("validate_lines", |ctx: ContextData<PlaceOrderCtx>| Box::pin(validate_lines(ctx)));
  p.on_root("snapshot_items", |ctx: ContextData<PlaceOrderCtx>| Box::pin(snapshot_items(ctx)));
  p.on_root("persist_order", |ctx: ContextData<PlaceOrderCtx>| Box::pin(persist_order(ctx)));
  p.on_root("notify_parties", |ctx: ContextData<PlaceOrderCtx>| Box::pin(notify_placed(ctx)));
  p
}

pub fn order_transition_pipeline() -> Pipeline<OrderTransitionCtx, SettlementError> {
  let mut p = Pipeline::<OrderTransitionCtx, SettlementError>::new(
    ORDER_TRANSITION_PIPELINE,
    &[("apply_transition", false, None), ("notify_parties", true, None)],
  );
  p.on_root("apply_transition", |ctx: ContextData<OrderTransitionCtx>| {
    Box::pin(apply_transition(ctx))
  });
  p.on_root("notify_parties", |ctx: ContextData<OrderTransitionCtx>| {
    Box::pin(notify_transition(ctx))
  });
  p
}

pub fn register_order_pipelines(registry: &PipelineRegistry<SettlementError>) -> Result<(), WorkflowError> {
  registry.register_pipeline(place_order_pipeline())?;
  registry.register_pipeline(order_transition_pipeline())
}

#[instrument(name = "orders::validate_lines", skip_all, err(Display))]
async fn validate_lines(ctx: ContextData<PlaceOrderCtx>) -> Result<PipelineControl> {
  let (directory, buyer_id, lines) = {
    let guard = ctx.read();
    (guard.deps.directory.clone(), guard.buyer_id, guard.lines.clone())
  };

  if lines.is_empty() {
    return Err(SettlementError::validation("an order needs at least one item"));
  }
  if let Some(line) = lines.iter().find(|l| l.quantity <= 0 || l.quantity > MAX_LINE_QUANTITY) {
    return Err(SettlementError::validation(format!(
      "quantity {} for product {} must be between 1 and {MAX_LINE_QUANTITY}",
      line.quantity, line.product_id
    )));
  }
  if !directory.user_exists(buyer_id).await? {
    return Err(SettlementError::not_found(format!("buyer {buyer_id}")));
  }
  Ok(PipelineControl::Continue)
}

#[instrument(name = "orders::snapshot_items", skip_all, err(Display))]
async fn snapshot_items(ctx: ContextData<PlaceOrderCtx>) -> Result<PipelineControl> {
  let (directory, buyer_id, lines) = {
    let guard = ctx.read();
    (guard.deps.directory.clone(), guard.buyer_id, guard.lines.clone())
  };

  let mut items = Vec::with_capacity(lines.len());
  for line in lines {
    let product = directory
      .product(line.product_id)
      .await?
      .ok_or_else(|| SettlementError::not_found(format!("product {}", line.product_id)))?;
    if !product.active {
      return Err(SettlementError::validation(format!("product {} is not for sale", product.id)));
    }
    if product.seller_id == buyer_id {
      return Err(SettlementError::validation(format!(
        "buyer {buyer_id} cannot order their own product {}",
        product.id
      )));
    }
    if product.price <= Decimal::ZERO {
      return Err(SettlementError::validation(format!("product {} has no valid price", product.id)));
    }
    items.push(OrderItem {
      id: Uuid::new_v4(),
      order_id: Uuid::nil(),
      product_id: product.id,
      seller_id: product.seller_id,
      title: product.title,
      quantity: line.quantity,
      unit_price: product.price,
    });
  }

  ctx.write().items = items;
  Ok(PipelineControl::Continue)
}

#[instrument(name = "orders::persist_order", skip_all, err(Display))]
async fn persist_order(ctx: ContextData<PlaceOrderCtx>) -> Result<PipelineControl> {
  let (store, buyer_id, mut items) = {
    let guard = ctx.read();
    (guard.deps.store.clone(), guard.buyer_id, guard.items.clone())
  };

  let order_id = Uuid::new_v4();
  for item in items.iter_mut() {
    item.order_id = order_id;
  }
  let now = Utc::now();
  let order = Order {
    id: order_id,
    buyer_id,
    total_amount: Order::items_total(&items),
    status: OrderStatus::Pending,
    payment_id: None,
    created_at: now,
    updated_at: now,
    items,
  };

  let mut tx = store.begin().await?;
  tx.insert_order(&order).await?;
  tx.commit().await?;

  event!(Level::INFO, %order_id, %buyer_id, total = %order.total_amount, items = order.items.len(), "Order placed.");
  ctx.write().order = Some(order);
  Ok(PipelineControl::Continue)
}

#[instrument(name = "orders::notify_placed", skip_all)]
async fn notify_placed(ctx: ContextData<PlaceOrderCtx>) -> Result<PipelineControl> {
  let (notifier, notifications) = {
    let guard = ctx.read();
    let mut notifications = Vec::new();
    if let Some(order) = guard.order.as_ref() {
      notifications.push(Notification::new(
        order.buyer_id,
        "Order Placed",
        format!("Your order {} for ${} has been placed", order.id, order.total_amount),
        NotificationCategory::Order,
        order.id,
      ));
      for seller_id in order.seller_ids() {
        notifications.push(Notification::new(
          seller_id,
          "New Order Received",
          format!("You have a new order {}", order.id),
          NotificationCategory::Order,
          order.id,
        ));
      }
    }
    (guard.deps.notifier.clone(), notifications)
  };
  let sent = notify_all(&notifier, notifications).await;
  ctx.write().notifications_sent = sent;
  Ok(PipelineControl::Continue)
}

#[instrument(name = "orders::apply_transition", skip_all, err(Display))]
async fn apply_transition(ctx: ContextData<OrderTransitionCtx>) -> Result<PipelineControl> {
  let (store, order_id, target, actor) = {
    let guard = ctx.read();
    (guard.deps.store.clone(), guard.order_id, guard.target, guard.actor)
  };

  let mut tx = store.begin().await?;
  let mut order = tx
    .lock_order(order_id)
    .await?
    .ok_or_else(|| SettlementError::not_found(format!("order {order_id}")))?;
  let captured = tx.order_has_captured_payment(order_id).await?;
  let next = order_state::transition(&order, target, actor, captured)?;
  tx.update_order_status(order_id, next, order.payment_id).await?;
  tx.commit().await?;

  event!(Level::INFO, %order_id, from = %order.status, to = %next, ?actor, "Order status changed.");
  order.status = next;
  order.updated_at = Utc::now();
  ctx.write().order = Some(order);
  Ok(PipelineControl::Continue)
}

#[instrument(name = "orders::notify_transition", skip_all)]
async fn notify_transition(ctx: ContextData<OrderTransitionCtx>) -> Result<PipelineControl> {
  let (notifier, notifications) = {
    let guard = ctx.read();
    let mut notifications = Vec::new();
    if let Some(order) = guard.order.as_ref() {
      let (title, message) = match order.status {
        OrderStatus::Cancelled => ("Order Cancelled", format!("Order {} has been cancelled", order.id)),
        OrderStatus::Completed => ("Order Completed", format!("Order {} has been completed", order.id)),
        _ => ("Order Updated", format!("Order {} is now {}", order.id, order.status)),
      };
      notifications.push(Notification::new(
        order.buyer_id,
        title,
        message.clone(),
        NotificationCategory::Order,
        order.id,
      ));
      if order.status == OrderStatus::Cancelled {
        for seller_id in order.seller_ids() {
          notifications.push(Notification::new(
            seller_id,
            title,
            message.clone(),
            NotificationCategory::Order,
            order.id,
          ));
        }
      }
    }
    (guard.deps.notifier.clone(), notifications)
  };
  let sent = notify_all(&notifier, notifications).await;
  ctx.write().notifications_sent = sent;
  Ok(PipelineControl::Continue)
}
