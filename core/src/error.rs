// core/src/error.rs

use crate::workflow::WorkflowError;
use thiserror::Error;

/// Every failure a settlement operation can surface to its caller.
///
/// A declined gateway call is deliberately absent: capture and payout
/// processing record it on the entity and report it through their result
/// types instead.
#[derive(Debug, Error)]
pub enum SettlementError {
  /// A precondition was violated. Nothing was written.
  #[error("Validation Error: {0}")]
  Validation(String),

  #[error("Not Found: {0}")]
  NotFound(String),

  /// Optimistic version check lost against a concurrent writer; safe to retry.
  #[error("Concurrent modification: {0}")]
  Conflict(String),

  /// A money invariant would break. The enclosing transaction is aborted.
  #[error("Consistency violation: {0}")]
  Consistency(String),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Database Error: {0}")]
  Database(#[from] sqlx::Error),

  #[error("Workflow Error: {source}")]
  Workflow {
    #[from]
    source: WorkflowError,
  },

  #[error("Internal Error: {0}")]
  Internal(String),
}

impl SettlementError {
  pub fn validation(message: impl Into<String>) -> Self {
    SettlementError::Validation(message.into())
  }

  pub fn not_found(message: impl Into<String>) -> Self {
    SettlementError::NotFound(message.into())
  }

  pub fn consistency(message: impl Into<String>) -> Self {
    SettlementError::Consistency(message.into())
  }
}

impl From<anyhow::Error> for SettlementError {
  fn from(err: anyhow::Error) -> Self {
    match err.downcast::<SettlementError>() {
      Ok(settlement_err) => settlement_err,
      Err(err) => match err.downcast::<sqlx::Error>() {
        Ok(db_err) => SettlementError::Database(db_err),
        Err(other) => SettlementError::Internal(other.to_string()),
      },
    }
  }
}

pub type Result<T, E = SettlementError> = std::result::Result<T, E>;
