// server/src/web/handlers/payment_handlers.rs

use actix_web::{web, HttpResponse};
use rust_decimal::Decimal;
use serde::Deserialize;
use settlement_core::{PaymentMethod, PaymentStatus};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::extractors::ActingUser;
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Deserialize, Debug)]
pub struct CaptureRequestPayload {
  pub order_id: Uuid,
  pub payment_method: PaymentMethod,
}

#[derive(Deserialize, Debug)]
pub struct RefundRequestPayload {
  pub amount: Decimal,
  #[serde(default)]
  pub reason: Option<String>,
}

/// Captures payment for an order. A declined capture is still a well-formed
/// outcome, answered with 402 and the full result so the client can retry.
#[instrument(
  name = "handler::capture",
  skip(app_state, req_payload, user),
  fields(buyer_id = %user.user_id, order_id = %req_payload.order_id)
)]
pub async fn capture_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<CaptureRequestPayload>,
  user: ActingUser,
) -> Result<HttpResponse, AppError> {
  let result = app_state
    .settlement
    .capture(req_payload.order_id, user.user_id, req_payload.payment_method)
    .await?;
  if result.status == PaymentStatus::Failed {
    warn!(payment_id = %result.payment_id, message = %result.message, "Capture failed.");
    return Ok(HttpResponse::PaymentRequired().json(result));
  }
  info!(payment_id = %result.payment_id, amount = %result.amount, "Payment captured.");
  Ok(HttpResponse::Created().json(result))
}

#[instrument(name = "handler::get_payment", skip(app_state, user), fields(payment_id = %path))]
pub async fn get_payment_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  user: ActingUser,
) -> Result<HttpResponse, AppError> {
  let payment = app_state.settlement.payment(path.into_inner()).await?;
  user.ensure_self_or_admin(payment.buyer_id)?;
  Ok(HttpResponse::Ok().json(payment))
}

#[instrument(name = "handler::payment_ledger", skip(app_state, user), fields(payment_id = %path))]
pub async fn payment_ledger_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  user: ActingUser,
) -> Result<HttpResponse, AppError> {
  let payment_id = path.into_inner();
  let payment = app_state.settlement.payment(payment_id).await?;
  user.ensure_self_or_admin(payment.buyer_id)?;
  let rows = app_state.settlement.ledger_for_payment(payment_id).await?;
  Ok(HttpResponse::Ok().json(rows))
}

/// Refunds are an operator action; buyers ask support rather than calling this.
#[instrument(
  name = "handler::refund",
  skip(app_state, req_payload, user),
  fields(payment_id = %path, amount = %req_payload.amount)
)]
pub async fn refund_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  req_payload: web::Json<RefundRequestPayload>,
  user: ActingUser,
) -> Result<HttpResponse, AppError> {
  user.ensure_admin()?;
  let payment_id = path.into_inner();
  let payload = req_payload.into_inner();
  let reason = payload.reason.unwrap_or_default();
  let result = app_state.settlement.refund(payment_id, payload.amount, &reason).await?;
  info!(refunded = %result.refunded_amount, status = ?result.status, "Refund applied.");
  Ok(HttpResponse::Ok().json(result))
}

#[instrument(name = "handler::payment_statistics", skip(app_state, user))]
pub async fn statistics_handler(app_state: web::Data<AppState>, user: ActingUser) -> Result<HttpResponse, AppError> {
  user.ensure_admin()?;
  let stats = app_state.settlement.payment_statistics().await?;
  Ok(HttpResponse::Ok().json(stats))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::{AppConfig, StoreBackend};
  use crate::web::configure_app_routes;
  use actix_web::{http::StatusCode, test, App};
  use settlement_core::{InMemoryDirectory, OrderLine, ProductListing, SellerAccount, SettlementConfig, SettlementService};
  use std::sync::Arc;
  use std::time::Duration;

  async fn state_with_captured_payment() -> (AppState, Uuid, Uuid) {
    let settlement = SettlementConfig {
      capture_success_rate: 1.0,
      gateway_latency: Duration::ZERO,
      ..SettlementConfig::default()
    };
    let directory = Arc::new(InMemoryDirectory::new());
    let buyer = Uuid::new_v4();
    let seller = Uuid::new_v4();
    let product_id = Uuid::new_v4();
    directory.add_user(buyer, "Buyer");
    directory.add_seller(SellerAccount {
      user_id: seller,
      display_name: "Lamp Shop".into(),
      default_payout_method: None,
    });
    directory.add_product(ProductListing {
      id: product_id,
      seller_id: seller,
      title: "Desk lamp".into(),
      price: Decimal::new(2500, 2),
      active: true,
    });

    let service = SettlementService::in_memory(settlement.clone(), directory).unwrap();
    let order = service
      .place_order(buyer, vec![OrderLine { product_id, quantity: 1 }])
      .await
      .unwrap();
    let paid = service.capture(order.id, buyer, PaymentMethod::CreditCard).await.unwrap();
    assert_eq!(paid.status, PaymentStatus::Completed);

    let config = AppConfig {
      server_host: "127.0.0.1".into(),
      server_port: 0,
      database_url: None,
      database_max_connections: 1,
      store_backend: StoreBackend::Memory,
      log_json: false,
      settlement,
    };
    let state = AppState {
      settlement: Arc::new(service),
      config: Arc::new(config),
    };
    (state, buyer, paid.payment_id)
  }

  #[actix_web::test]
  async fn refunds_need_the_operator_role() {
    let (state, buyer, payment_id) = state_with_captured_payment().await;
    let app = test::init_service(
      App::new()
        .app_data(web::Data::new(state.clone()))
        .configure(configure_app_routes),
    )
    .await;
    let uri = format!("/api/v1/payments/{payment_id}/refunds");

    let as_buyer = test::TestRequest::post()
      .uri(&uri)
      .insert_header(("X-User-ID", buyer.to_string()))
      .set_json(serde_json::json!({ "amount": "5.00" }))
      .to_request();
    assert_eq!(test::call_service(&app, as_buyer).await.status(), StatusCode::FORBIDDEN);
    let untouched = state.settlement.payment(payment_id).await.unwrap();
    assert_eq!(untouched.refunded_amount, Decimal::ZERO);

    let as_admin = test::TestRequest::post()
      .uri(&uri)
      .insert_header(("X-User-ID", Uuid::new_v4().to_string()))
      .insert_header(("X-User-Role", "admin"))
      .set_json(serde_json::json!({ "amount": "5.00", "reason": "Damaged" }))
      .to_request();
    assert_eq!(test::call_service(&app, as_admin).await.status(), StatusCode::OK);
    let refunded = state.settlement.payment(payment_id).await.unwrap();
    assert_eq!(refunded.refunded_amount, Decimal::new(500, 2));
  }
}
