// server/src/config.rs

use crate::errors::{AppError, Result};
use dotenvy::dotenv;
use settlement_core::SettlementConfig;
use std::env;

/// Where the settlement ledger lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
  Postgres,
  Memory,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,
  pub database_url: Option<String>,
  pub database_max_connections: u32,
  pub store_backend: StoreBackend,
  pub log_json: bool,
  pub settlement: SettlementConfig,
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok();

    let get_env = |var_name: &str| env::var(var_name).ok().filter(|v| !v.trim().is_empty());

    let server_host = get_env("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
    let server_port = get_env("SERVER_PORT")
      .unwrap_or_else(|| "8080".to_string())
      .parse::<u16>()
      .map_err(|e| AppError::Config(format!("Invalid SERVER_PORT: {}", e)))?;
    let database_max_connections = get_env("DATABASE_MAX_CONNECTIONS")
      .unwrap_or_else(|| "10".to_string())
      .parse::<u32>()
      .map_err(|e| AppError::Config(format!("Invalid DATABASE_MAX_CONNECTIONS: {}", e)))?;

    let store_backend = match get_env("STORE_BACKEND").map(|v| v.trim().to_ascii_lowercase()) {
      None => StoreBackend::Postgres,
      Some(v) if v == "postgres" => StoreBackend::Postgres,
      Some(v) if v == "memory" => StoreBackend::Memory,
      Some(other) => {
        return Err(AppError::Config(format!(
          "Invalid STORE_BACKEND '{}': expected 'postgres' or 'memory'",
          other
        )))
      }
    };
    let database_url = get_env("DATABASE_URL");
    if store_backend == StoreBackend::Postgres && database_url.is_none() {
      return Err(AppError::Config(
        "Missing environment variable 'DATABASE_URL' (required when STORE_BACKEND=postgres)".to_string(),
      ));
    }

    let log_json = get_env("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json"));
    let settlement = SettlementConfig::from_env()?;

    tracing::info!(?store_backend, commission_rate = %settlement.commission_rate, "Application configuration loaded.");

    Ok(Self {
      server_host,
      server_port,
      database_url,
      database_max_connections,
      store_backend,
      log_json,
      settlement,
    })
  }
}
