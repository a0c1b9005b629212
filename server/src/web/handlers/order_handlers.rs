// server/src/web/handlers/order_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use settlement_core::OrderLine;
use tracing::{info, instrument};
use uuid::Uuid;

use super::extractors::ActingUser;
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Deserialize, Debug)]
pub struct PlaceOrderRequestPayload {
  pub lines: Vec<OrderLine>,
}

#[instrument(
  name = "handler::place_order",
  skip(app_state, req_payload, user),
  fields(buyer_id = %user.user_id, lines = req_payload.lines.len())
)]
pub async fn place_order_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<PlaceOrderRequestPayload>,
  user: ActingUser,
) -> Result<HttpResponse, AppError> {
  let order = app_state
    .settlement
    .place_order(user.user_id, req_payload.into_inner().lines)
    .await?;
  info!(order_id = %order.id, total = %order.total_amount, "Order placed.");
  Ok(HttpResponse::Created().json(order))
}

#[instrument(name = "handler::get_order", skip(app_state, user), fields(order_id = %path))]
pub async fn get_order_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  user: ActingUser,
) -> Result<HttpResponse, AppError> {
  let order = app_state.settlement.order(path.into_inner()).await?;
  let is_party = order.buyer_id == user.user_id || order.items.iter().any(|i| i.seller_id == user.user_id);
  if !is_party && !user.is_admin {
    return Err(AppError::Forbidden(format!("order {} is not visible to user {}", order.id, user.user_id)));
  }
  Ok(HttpResponse::Ok().json(order))
}

#[instrument(name = "handler::cancel_order", skip(app_state, user), fields(order_id = %path, user_id = %user.user_id))]
pub async fn cancel_order_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  user: ActingUser,
) -> Result<HttpResponse, AppError> {
  let order = app_state.settlement.cancel_order(path.into_inner(), user.user_id).await?;
  Ok(HttpResponse::Ok().json(order))
}

#[instrument(name = "handler::complete_order", skip(app_state, user), fields(order_id = %path, user_id = %user.user_id))]
pub async fn complete_order_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  user: ActingUser,
) -> Result<HttpResponse, AppError> {
  let order = app_state.settlement.complete_order(path.into_inner(), user.user_id).await?;
  Ok(HttpResponse::Ok().json(order))
}
