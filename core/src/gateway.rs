// core/src/gateway.rs

//! The external money-movement boundary: capturing buyer payments and
//! disbursing seller payouts.

use async_trait::async_trait;
use rand::Rng;
use rust_decimal::Decimal;
use std::time::Duration;
use tracing::{event, instrument, Level};
use uuid::Uuid;

use crate::ledger::PaymentMethod;

#[derive(Debug, Clone)]
pub struct CaptureRequest {
  /// Idempotency key: a retried call with the same id must not charge twice.
  pub transaction_id: String,
  pub payment_id: Uuid,
  pub buyer_id: Uuid,
  pub amount: Decimal,
  pub method: PaymentMethod,
}

#[derive(Debug, Clone)]
pub struct DisbursementRequest {
  /// Idempotency key.
  pub payout_reference: String,
  pub payout_id: Uuid,
  pub seller_id: Uuid,
  pub net_amount: Decimal,
  pub method: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayOutcome {
  Approved { response: String },
  Declined { reason: String },
}

impl GatewayOutcome {
  pub fn is_approved(&self) -> bool {
    matches!(self, GatewayOutcome::Approved { .. })
  }

  pub fn message(&self) -> &str {
    match self {
      GatewayOutcome::Approved { response } => response,
      GatewayOutcome::Declined { reason } => reason,
    }
  }
}

/// Errors are transport-level problems; the settlement core treats them
/// exactly like a decline.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
  fn name(&self) -> &str;

  async fn capture(&self, request: &CaptureRequest) -> anyhow::Result<GatewayOutcome>;

  async fn disburse(&self, request: &DisbursementRequest) -> anyhow::Result<GatewayOutcome>;
}

/// Runs a gateway call under `timeout`, folding errors and timeouts into a decline.
pub async fn bounded<F>(operation: &str, timeout: Duration, call: F) -> GatewayOutcome
where
  F: std::future::Future<Output = anyhow::Result<GatewayOutcome>>,
{
  match tokio::time::timeout(timeout, call).await {
    Ok(Ok(outcome)) => outcome,
    Ok(Err(e)) => {
      event!(Level::WARN, operation, error = %e, "Gateway call failed; treating as declined.");
      GatewayOutcome::Declined {
        reason: format!("Gateway error: {e}"),
      }
    }
    Err(_) => {
      event!(Level::WARN, operation, timeout_ms = timeout.as_millis() as u64, "Gateway call timed out; treating as declined.");
      GatewayOutcome::Declined {
        reason: format!("Gateway timed out after {} ms", timeout.as_millis()),
      }
    }
  }
}

/// Probabilistic stand-in for a real processor.
#[derive(Debug, Clone)]
pub struct SimulatedGateway {
  pub capture_success_rate: f64,
  pub payout_success_rate: f64,
  pub latency: Duration,
}

impl SimulatedGateway {
  pub fn new(capture_success_rate: f64, payout_success_rate: f64, latency: Duration) -> Self {
    Self {
      capture_success_rate: capture_success_rate.clamp(0.0, 1.0),
      payout_success_rate: payout_success_rate.clamp(0.0, 1.0),
      latency,
    }
  }

  fn roll(probability: f64) -> bool {
    rand::thread_rng().gen_bool(probability)
  }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
  fn name(&self) -> &str {
    "SIMULATED"
  }

  #[instrument(name = "SimulatedGateway::capture", skip_all, fields(transaction_id = %request.transaction_id, amount = %request.amount))]
  async fn capture(&self, request: &CaptureRequest) -> anyhow::Result<GatewayOutcome> {
    let approved = Self::roll(self.capture_success_rate);
    tokio::time::sleep(self.latency).await;
    Ok(if approved {
      GatewayOutcome::Approved {
        response: format!("Payment processed successfully via {}", request.method),
      }
    } else {
      GatewayOutcome::Declined {
        reason: "Payment processing failed".to_string(),
      }
    })
  }

  #[instrument(name = "SimulatedGateway::disburse", skip_all, fields(payout_reference = %request.payout_reference, net_amount = %request.net_amount))]
  async fn disburse(&self, request: &DisbursementRequest) -> anyhow::Result<GatewayOutcome> {
    let approved = Self::roll(self.payout_success_rate);
    tokio::time::sleep(self.latency).await;
    Ok(if approved {
      GatewayOutcome::Approved {
        response: format!("Payout sent via {}", request.method),
      }
    } else {
      GatewayOutcome::Declined {
        reason: "Payout processing failed".to_string(),
      }
    })
  }
}
