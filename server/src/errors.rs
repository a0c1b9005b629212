// server/src/errors.rs

use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use settlement_core::{SettlementError, WorkflowError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Validation Error: {0}")]
  Validation(String),

  #[error("Authentication Failed: {0}")]
  Auth(String),

  #[error("Forbidden: {0}")]
  Forbidden(String),

  #[error("Resource Not Found: {0}")]
  NotFound(String),

  #[error("Conflict: {0}")]
  Conflict(String),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Database Error: {0}")]
  Sqlx(#[from] sqlx::Error),

  #[error("Migration Error: {0}")]
  Migrate(#[from] sqlx::migrate::MigrateError),

  #[error("Settlement Workflow Error: {source}")]
  Workflow { source: WorkflowError },

  #[error("Internal Server Error: {0}")]
  Internal(String),
}

impl From<SettlementError> for AppError {
  fn from(err: SettlementError) -> Self {
    match err {
      SettlementError::Validation(m) => AppError::Validation(m),
      SettlementError::NotFound(m) => AppError::NotFound(m),
      SettlementError::Conflict(m) => AppError::Conflict(m),
      SettlementError::Config(m) => AppError::Config(m),
      SettlementError::Database(e) => AppError::Sqlx(e),
      SettlementError::Workflow { source } => AppError::Workflow { source },
      SettlementError::Consistency(m) => AppError::Internal(format!("consistency check failed: {m}")),
      SettlementError::Internal(m) => AppError::Internal(m),
    }
  }
}

impl From<anyhow::Error> for AppError {
  fn from(err: anyhow::Error) -> Self {
    SettlementError::from(err).into()
  }
}

impl ResponseError for AppError {
  fn error_response(&self) -> HttpResponse {
    match self {
      AppError::Validation(_) | AppError::Auth(_) | AppError::Forbidden(_) | AppError::NotFound(_) | AppError::Conflict(_) => {
        tracing::warn!(application_error = %self, "Responding with client error");
      }
      _ => tracing::error!(application_error = %self, "Responding with error"),
    }
    match self {
      AppError::Validation(m) => HttpResponse::BadRequest().json(json!({"error": m})),
      AppError::Auth(m) => HttpResponse::Unauthorized().json(json!({"error": m})),
      AppError::Forbidden(m) => HttpResponse::Forbidden().json(json!({"error": m})),
      AppError::NotFound(m) => HttpResponse::NotFound().json(json!({"error": m})),
      AppError::Conflict(m) => HttpResponse::Conflict().json(json!({"error": m, "retryable": true})),
      AppError::Config(m) => {
        HttpResponse::InternalServerError().json(json!({"error": "Configuration issue", "detail": m}))
      }
      AppError::Sqlx(_) | AppError::Migrate(_) => {
        HttpResponse::InternalServerError().json(json!({"error": "Database operation failed"}))
      }
      AppError::Workflow { source } => HttpResponse::InternalServerError()
        .json(json!({"error": "Workflow processing error", "detail": source.to_string()})),
      AppError::Internal(m) => {
        HttpResponse::InternalServerError().json(json!({"error": "An internal error occurred", "detail": m}))
      }
    }
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
