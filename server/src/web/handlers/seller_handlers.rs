// server/src/web/handlers/seller_handlers.rs

use actix_web::{web, HttpResponse};
use tracing::instrument;
use uuid::Uuid;

use super::extractors::ActingUser;
use crate::errors::AppError;
use crate::state::AppState;

#[instrument(name = "handler::seller_earnings", skip(app_state, user), fields(seller_id = %path))]
pub async fn earnings_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  user: ActingUser,
) -> Result<HttpResponse, AppError> {
  let seller_id = path.into_inner();
  user.ensure_self_or_admin(seller_id)?;
  let summary = app_state.settlement.seller_summary(seller_id).await?;
  Ok(HttpResponse::Ok().json(summary))
}

#[instrument(name = "handler::seller_payouts", skip(app_state, user), fields(seller_id = %path))]
pub async fn seller_payouts_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  user: ActingUser,
) -> Result<HttpResponse, AppError> {
  let seller_id = path.into_inner();
  user.ensure_self_or_admin(seller_id)?;
  let payouts = app_state.settlement.payouts_for_seller(seller_id).await?;
  Ok(HttpResponse::Ok().json(payouts))
}
