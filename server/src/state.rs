// server/src/state.rs
use crate::config::AppConfig;
use settlement_core::SettlementService;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
  pub settlement: Arc<SettlementService>,
  pub config: Arc<AppConfig>,
}
