// core/src/config.rs

use crate::error::{Result, SettlementError};
use crate::fees::{self, FeeSchedule};
use dotenvy::dotenv;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Tunables of the settlement core.
#[derive(Debug, Clone)]
pub struct SettlementConfig {
  /// Platform commission, percent of each captured payment.
  pub commission_rate: Decimal,
  /// Probability the simulated gateway approves a capture.
  pub capture_success_rate: f64,
  /// Probability the simulated settlement rail completes a payout.
  pub payout_success_rate: f64,
  /// Upper bound on any single gateway call; exceeding it counts as a decline.
  pub gateway_timeout: Duration,
  /// Simulated gateway round-trip.
  pub gateway_latency: Duration,
  /// Weekly batch skips sellers below this balance.
  pub payout_minimum: Decimal,
  pub default_payout_method: String,
  pub fee_schedule: FeeSchedule,
  pub payout_period_days: i64,
  pub payout_arrival_days: i64,
}

impl Default for SettlementConfig {
  fn default() -> Self {
    Self {
      commission_rate: dec!(10.00),
      capture_success_rate: 0.95,
      payout_success_rate: 0.98,
      gateway_timeout: Duration::from_millis(5_000),
      gateway_latency: Duration::from_millis(50),
      payout_minimum: dec!(10.00),
      default_payout_method: "BANK_TRANSFER".to_string(),
      fee_schedule: FeeSchedule::standard(),
      payout_period_days: 7,
      payout_arrival_days: 3,
    }
  }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
  T: FromStr,
  T::Err: std::fmt::Display,
{
  match env::var(name) {
    Ok(raw) => raw
      .trim()
      .parse::<T>()
      .map_err(|e| SettlementError::Config(format!("Invalid {name} value '{raw}': {e}"))),
    Err(_) => Ok(default),
  }
}

impl SettlementConfig {
  /// Loads `.env` when present, then reads each setting from the environment,
  /// falling back to the defaults above.
  pub fn from_env() -> Result<Self> {
    dotenv().ok();
    let defaults = Self::default();

    let mut fee_schedule = defaults.fee_schedule.clone();
    if let Ok(raw) = env::var("PAYOUT_FEE_SCHEDULE") {
      fee_schedule = fee_schedule.merge_json(&raw)?;
    }

    let config = Self {
      commission_rate: parse_var("COMMISSION_RATE", defaults.commission_rate)?,
      capture_success_rate: parse_var("CAPTURE_SUCCESS_RATE", defaults.capture_success_rate)?,
      payout_success_rate: parse_var("PAYOUT_SUCCESS_RATE", defaults.payout_success_rate)?,
      gateway_timeout: Duration::from_millis(parse_var("GATEWAY_TIMEOUT_MS", 5_000u64)?),
      gateway_latency: Duration::from_millis(parse_var("GATEWAY_LATENCY_MS", 50u64)?),
      payout_minimum: parse_var("PAYOUT_MINIMUM", defaults.payout_minimum)?,
      default_payout_method: fees::normalize(&parse_var("DEFAULT_PAYOUT_METHOD", defaults.default_payout_method)?),
      fee_schedule,
      payout_period_days: parse_var("PAYOUT_PERIOD_DAYS", defaults.payout_period_days)?,
      payout_arrival_days: parse_var("PAYOUT_ARRIVAL_DAYS", defaults.payout_arrival_days)?,
    };
    config.validate()?;
    tracing::info!(
      commission_rate = %config.commission_rate,
      payout_minimum = %config.payout_minimum,
      default_payout_method = %config.default_payout_method,
      "Settlement configuration loaded."
    );
    Ok(config)
  }

  pub fn validate(&self) -> Result<()> {
    if self.commission_rate < Decimal::ZERO || self.commission_rate > Decimal::ONE_HUNDRED {
      return Err(SettlementError::Config(format!(
        "COMMISSION_RATE must be within 0..=100, got {}",
        self.commission_rate
      )));
    }
    for (name, rate) in [
      ("CAPTURE_SUCCESS_RATE", self.capture_success_rate),
      ("PAYOUT_SUCCESS_RATE", self.payout_success_rate),
    ] {
      if !(0.0..=1.0).contains(&rate) {
        return Err(SettlementError::Config(format!("{name} must be within 0..=1, got {rate}")));
      }
    }
    if self.gateway_timeout.is_zero() {
      return Err(SettlementError::Config("GATEWAY_TIMEOUT_MS must be positive".to_string()));
    }
    if self.payout_minimum < Decimal::ZERO {
      return Err(SettlementError::Config("PAYOUT_MINIMUM must not be negative".to_string()));
    }
    if !self.fee_schedule.supports(&self.default_payout_method) {
      return Err(SettlementError::Config(format!(
        "DEFAULT_PAYOUT_METHOD '{}' has no fee rule",
        self.default_payout_method
      )));
    }
    Ok(())
  }
}
