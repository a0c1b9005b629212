// core/src/money.rs

//! Fixed-point money helpers. Every amount in the settlement core is a
//! `Decimal` carried at two decimal places; floats never touch money.

use crate::error::{Result, SettlementError};
use rust_decimal::{Decimal, RoundingStrategy};

pub const MONEY_SCALE: u32 = 2;

pub const CURRENCY: &str = "USD";

/// Rounds half-up (away from zero on a tie) to cents.
pub fn round_half_up(value: Decimal) -> Decimal {
  let mut rounded = value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero);
  rounded.rescale(MONEY_SCALE);
  rounded
}

/// Validates a caller-supplied amount: strictly positive and no finer than a cent.
pub fn require_positive_amount(amount: Decimal, field: &str) -> Result<Decimal> {
  if amount <= Decimal::ZERO {
    return Err(SettlementError::validation(format!("{field} must be greater than zero")));
  }
  if amount.normalize().scale() > MONEY_SCALE {
    return Err(SettlementError::validation(format!(
      "{field} must have at most {MONEY_SCALE} decimal places"
    )));
  }
  let mut scaled = amount;
  scaled.rescale(MONEY_SCALE);
  Ok(scaled)
}
