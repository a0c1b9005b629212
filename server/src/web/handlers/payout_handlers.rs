// server/src/web/handlers/payout_handlers.rs

use actix_web::{web, HttpResponse};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use super::extractors::ActingUser;
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Deserialize, Debug)]
pub struct PayoutRequestPayload {
  pub amount: Decimal,
  #[serde(default)]
  pub payout_method: Option<String>,
}

#[instrument(
  name = "handler::request_payout",
  skip(app_state, req_payload, user),
  fields(seller_id = %user.user_id, amount = %req_payload.amount)
)]
pub async fn request_payout_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<PayoutRequestPayload>,
  user: ActingUser,
) -> Result<HttpResponse, AppError> {
  let payload = req_payload.into_inner();
  let method = payload
    .payout_method
    .unwrap_or_else(|| app_state.config.settlement.default_payout_method.clone());
  let result = app_state
    .settlement
    .request_payout(user.user_id, payload.amount, &method)
    .await?;
  info!(payout_id = %result.payout.id, remaining = %result.remaining_earnings, "Payout requested.");
  Ok(HttpResponse::Created().json(result))
}

#[instrument(name = "handler::get_payout", skip(app_state, user), fields(payout_id = %path))]
pub async fn get_payout_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  user: ActingUser,
) -> Result<HttpResponse, AppError> {
  let payout = app_state.settlement.payout(path.into_inner()).await?;
  user.ensure_self_or_admin(payout.seller_id)?;
  Ok(HttpResponse::Ok().json(payout))
}

#[instrument(name = "handler::process_payout", skip(app_state, user), fields(payout_id = %path))]
pub async fn process_payout_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  user: ActingUser,
) -> Result<HttpResponse, AppError> {
  user.ensure_admin()?;
  let payout_id = path.into_inner();
  let processed = app_state.settlement.process_payout(payout_id).await?;
  let payout = app_state.settlement.payout(payout_id).await?;
  Ok(HttpResponse::Ok().json(json!({ "processed": processed, "payout": payout })))
}

#[derive(Deserialize, Debug)]
pub struct FailPayoutPayload {
  pub reason: String,
}

/// For payouts left PROCESSING after a crash between disbursement and booking.
#[instrument(name = "handler::fail_stuck_payout", skip(app_state, req_payload, user), fields(payout_id = %path))]
pub async fn fail_stuck_payout_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  req_payload: web::Json<FailPayoutPayload>,
  user: ActingUser,
) -> Result<HttpResponse, AppError> {
  user.ensure_admin()?;
  let payout = app_state
    .settlement
    .fail_stuck_payout(path.into_inner(), &req_payload.reason)
    .await?;
  info!(payout_id = %payout.id, "Stuck payout failed by operator.");
  Ok(HttpResponse::Ok().json(payout))
}

#[instrument(name = "handler::weekly_payout_run", skip(app_state, user))]
pub async fn weekly_run_handler(app_state: web::Data<AppState>, user: ActingUser) -> Result<HttpResponse, AppError> {
  user.ensure_admin()?;
  let report = app_state.settlement.run_weekly_payouts().await?;
  info!(created = report.created.len(), skipped = report.skipped.len(), "Weekly payout run finished.");
  Ok(HttpResponse::Ok().json(report))
}
