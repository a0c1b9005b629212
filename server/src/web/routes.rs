// server/src/web/routes.rs

use actix_web::web;

use crate::web::handlers::{order_handlers, payment_handlers, payout_handlers, seller_handlers};

async fn health_check_handler() -> actix_web::HttpResponse {
  actix_web::HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg.service(
    web::scope("/api/v1")
      .route("/health", web::get().to(health_check_handler))
      .service(
        web::scope("/orders")
          .route("", web::post().to(order_handlers::place_order_handler))
          .route("/{order_id}", web::get().to(order_handlers::get_order_handler))
          .route("/{order_id}/cancel", web::post().to(order_handlers::cancel_order_handler))
          .route("/{order_id}/complete", web::post().to(order_handlers::complete_order_handler)),
      )
      .service(
        web::scope("/payments")
          .route("", web::post().to(payment_handlers::capture_handler))
          // Registered before "/{payment_id}" so it is not parsed as an id.
          .route("/statistics", web::get().to(payment_handlers::statistics_handler))
          .route("/{payment_id}", web::get().to(payment_handlers::get_payment_handler))
          .route("/{payment_id}/ledger", web::get().to(payment_handlers::payment_ledger_handler))
          .route("/{payment_id}/refunds", web::post().to(payment_handlers::refund_handler)),
      )
      .service(
        web::scope("/payouts")
          .route("", web::post().to(payout_handlers::request_payout_handler))
          .route("/weekly-run", web::post().to(payout_handlers::weekly_run_handler))
          .route("/{payout_id}", web::get().to(payout_handlers::get_payout_handler))
          .route("/{payout_id}/process", web::post().to(payout_handlers::process_payout_handler))
          .route("/{payout_id}/fail", web::post().to(payout_handlers::fail_stuck_payout_handler)),
      )
      .service(
        web::scope("/sellers")
          .route("/{seller_id}/earnings", web::get().to(seller_handlers::earnings_handler))
          .route("/{seller_id}/payouts", web::get().to(seller_handlers::seller_payouts_handler)),
      ),
  );
}
