// core/src/pipelines/mod.rs

//! The settlement workflows, one pipeline per operation, each over its own
//! context type so the registry can dispatch on it.

pub mod capture;
pub mod common_steps;
pub mod contexts;
pub mod orders;
pub mod payout;
pub mod refund;

use crate::error::SettlementError;
use crate::workflow::{PipelineRegistry, WorkflowError};

pub use contexts::{
  CaptureCtx, CreatePayoutCtx, FailPayoutCtx, OrderLine, OrderTransitionCtx, PlaceOrderCtx, ProcessPayoutCtx, RefundCtx,
  SettlementDeps,
};

/// Registers every settlement pipeline. Called once when the service is built.
pub fn register_all_pipelines(registry: &PipelineRegistry<SettlementError>) -> Result<(), WorkflowError> {
  tracing::debug!("Registering settlement pipelines.");
  orders::register_order_pipelines(registry)?;
  capture::register_capture_pipeline(registry)?;
  refund::register_refund_pipeline(registry)?;
  payout::register_payout_pipelines(registry)?;
  tracing::debug!(pipelines = ?registry.registered_types(), "Settlement pipelines registered.");
  Ok(())
}
