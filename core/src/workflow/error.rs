// core/src/workflow/error.rs

use thiserror::Error;

/// Failures of the pipeline machinery itself, as opposed to the business
/// errors its handlers return.
#[derive(Debug, Error)]
pub enum WorkflowError {
  #[error("Step not found: {step_name}")]
  StepNotFound { step_name: String },

  #[error("Step already declared: {step_name}")]
  DuplicateStep { step_name: String },

  #[error("Handler missing for non-optional step: {step_name}")]
  HandlerMissing { step_name: String },

  #[error("Type mismatch during context downcast (expected {expected_type})")]
  TypeMismatch { expected_type: String },

  #[error("No pipeline registered for context type {type_name}")]
  NotRegistered { type_name: String },

  #[error("Pipeline for context type {type_name} is already registered")]
  AlreadyRegistered { type_name: String },

  #[error("Pipeline '{pipeline}' finished without producing {missing}")]
  MissingOutcome { pipeline: String, missing: String },
}
