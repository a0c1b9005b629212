// core/src/fees.rs

//! Table-driven payout fees. A method's fee is data; adding a method means
//! adding a row, not code.

use crate::error::{Result, SettlementError};
use crate::ledger::Payout;
use crate::money::round_half_up;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `fee = max(minimum, round_half_up(amount * percent / 100) + flat)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeRule {
  #[serde(default)]
  pub percent: Decimal,
  #[serde(default)]
  pub minimum: Decimal,
  #[serde(default)]
  pub flat: Decimal,
}

impl FeeRule {
  pub fn fee_for(&self, amount: Decimal) -> Decimal {
    let variable = round_half_up(amount * self.percent / Decimal::ONE_HUNDRED) + self.flat;
    round_half_up(variable.max(self.minimum))
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeeSchedule {
  rules: BTreeMap<String, FeeRule>,
}

impl Default for FeeSchedule {
  fn default() -> Self {
    Self::standard()
  }
}

impl FeeSchedule {
  pub fn empty() -> Self {
    Self { rules: BTreeMap::new() }
  }

  /// BANK_TRANSFER, PAYPAL and CHECK: 2% with a $1.00 minimum.
  pub fn standard() -> Self {
    let two_percent = FeeRule {
      percent: dec!(2),
      minimum: dec!(1.00),
      flat: Decimal::ZERO,
    };
    Self::empty()
      .with_rule("BANK_TRANSFER", two_percent)
      .with_rule("PAYPAL", two_percent)
      .with_rule("CHECK", two_percent)
  }

  pub fn with_rule(mut self, method: &str, rule: FeeRule) -> Self {
    self.rules.insert(normalize(method), rule);
    self
  }

  /// Overlays rules parsed from a JSON object such as
  /// `{"WIRE": {"percent": "1.5", "minimum": "5.00"}}` onto this table.
  pub fn merge_json(mut self, json: &str) -> Result<Self> {
    let overrides: BTreeMap<String, FeeRule> = serde_json::from_str(json)
      .map_err(|e| SettlementError::Config(format!("Invalid payout fee schedule: {e}")))?;
    for (method, rule) in overrides {
      if rule.percent < Decimal::ZERO || rule.minimum < Decimal::ZERO || rule.flat < Decimal::ZERO {
        return Err(SettlementError::Config(format!("Negative fee component for method {method}")));
      }
      self.rules.insert(normalize(&method), rule);
    }
    Ok(self)
  }

  pub fn methods(&self) -> impl Iterator<Item = &str> {
    self.rules.keys().map(String::as_str)
  }

  pub fn supports(&self, method: &str) -> bool {
    self.rules.contains_key(&normalize(method))
  }

  /// Fee for paying `amount` out through `method`.
  pub fn fee_for(&self, method: &str, amount: Decimal) -> Result<Decimal> {
    self
      .rules
      .get(&normalize(method))
      .map(|rule| rule.fee_for(amount))
      .ok_or_else(|| SettlementError::validation(format!("unsupported payout method '{method}'")))
  }
}

/// Canonical method key, e.g. ` bank_transfer ` becomes `BANK_TRANSFER`.
pub fn normalize(method: &str) -> String {
  method.trim().to_ascii_uppercase()
}

/// Re-derives `net_amount` from `amount` and `transaction_fee`.
pub fn recompute_net(payout: &mut Payout) {
  payout.net_amount = round_half_up(payout.amount - payout.transaction_fee);
}
