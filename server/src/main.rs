// server/src/main.rs

mod config;
mod errors;
mod state;
mod web;

use crate::config::{AppConfig, StoreBackend};
use crate::errors::{AppError, Result as AppResult};
use crate::state::AppState;

use actix_web::{web as actix_data, App, HttpServer};
use settlement_core::{
  InMemoryDirectory, PgDirectory, PgLedgerStore, SettlementService, SimulatedGateway, TracingNotifier,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

fn init_tracing(json: bool) {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  let builder = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_span_events(FmtSpan::CLOSE);
  if json {
    builder.json().init();
  } else {
    builder.init();
  }
}

async fn build_service(app_config: &AppConfig) -> AppResult<SettlementService> {
  let settlement = app_config.settlement.clone();
  match app_config.store_backend {
    StoreBackend::Memory => {
      tracing::warn!("Using the in-memory ledger; all state is lost on shutdown.");
      Ok(SettlementService::in_memory(settlement, Arc::new(InMemoryDirectory::new()))?)
    }
    StoreBackend::Postgres => {
      let database_url = app_config
        .database_url
        .as_deref()
        .ok_or_else(|| AppError::Config("DATABASE_URL is not set".to_string()))?;
      let pool = PgPoolOptions::new()
        .max_connections(app_config.database_max_connections)
        .connect(database_url)
        .await?;
      tracing::info!("Successfully connected to the database.");

      sqlx::migrate!("./migrations").run(&pool).await?;
      tracing::info!("Database migrations applied.");

      let gateway = SimulatedGateway::new(
        settlement.capture_success_rate,
        settlement.payout_success_rate,
        settlement.gateway_latency,
      );
      Ok(SettlementService::new(
        Arc::new(PgLedgerStore::new(pool.clone())),
        Arc::new(gateway),
        Arc::new(TracingNotifier),
        Arc::new(PgDirectory::new(pool)),
        settlement,
      )?)
    }
  }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
  let app_config = match AppConfig::from_env() {
    Ok(cfg) => Arc::new(cfg),
    Err(e) => {
      init_tracing(false);
      tracing::error!(error = %e, "Failed to load application configuration.");
      return Err(std::io::Error::other(e.to_string()));
    }
  };
  init_tracing(app_config.log_json);

  tracing::info!("Starting settlement server...");

  let service = build_service(&app_config).await.map_err(|e| {
    tracing::error!(error = %e, "Failed to initialise the settlement service.");
    std::io::Error::other(e.to_string())
  })?;

  let app_state = AppState {
    settlement: Arc::new(service),
    config: app_config.clone(),
  };

  let server_address = format!("{}:{}", app_config.server_host, app_config.server_port);
  tracing::info!("Attempting to bind server to {}...", server_address);

  HttpServer::new(move || {
    App::new()
      .app_data(actix_data::Data::new(app_state.clone()))
      .wrap(tracing_actix_web::TracingLogger::default())
      .configure(web::configure_app_routes)
  })
  .bind(&server_address)?
  .run()
  .await
}
