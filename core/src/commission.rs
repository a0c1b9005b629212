// core/src/commission.rs

//! Commission split and proportional apportionment.

use crate::ledger::Payment;
use crate::money::round_half_up;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use uuid::Uuid;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;
const CENT: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommissionSplit {
  pub commission: Decimal,
  pub seller_earnings: Decimal,
}

/// `commission = round_half_up(amount * rate / 100)`, the seller keeps the rest.
pub fn split(amount: Decimal, rate: Decimal) -> CommissionSplit {
  let commission = round_half_up(amount * rate / HUNDRED);
  CommissionSplit {
    commission,
    seller_earnings: round_half_up(amount - commission),
  }
}

/// Re-derives a payment's commission and seller earnings from its amount and rate.
/// Call after constructing a payment or changing either input.
pub fn recompute(payment: &mut Payment) {
  let CommissionSplit {
    commission,
    seller_earnings,
  } = split(payment.amount, payment.commission_rate);
  payment.commission_amount = commission;
  payment.seller_earnings = seller_earnings;
}

/// Splits `total` across `weights` proportionally, to the cent.
///
/// Every part starts as `total * weight / sum` truncated to cents. The cents
/// left over go one at a time to the parts with the largest truncated
/// fraction (heavier weight, then earlier position, on ties). Parts never
/// change sign, never exceed their exact share by a cent or more, and sum
/// exactly to `total`. Output preserves input order. Zero or empty weights
/// yield an empty vector.
pub fn apportion(total: Decimal, weights: &[(Uuid, Decimal)]) -> Vec<(Uuid, Decimal)> {
  let weight_sum: Decimal = weights.iter().map(|(_, w)| *w).sum();
  if weights.is_empty() || weight_sum <= Decimal::ZERO {
    return Vec::new();
  }
  if total < Decimal::ZERO {
    return apportion(-total, weights)
      .into_iter()
      .map(|(id, part)| (id, -part))
      .collect();
  }

  let total = round_half_up(total);
  let mut fractions = Vec::with_capacity(weights.len());
  let mut parts: Vec<(Uuid, Decimal)> = weights
    .iter()
    .enumerate()
    .map(|(idx, (id, w))| {
      let exact = total * *w / weight_sum;
      let floor = exact.round_dp_with_strategy(2, RoundingStrategy::ToZero);
      fractions.push((idx, exact - floor));
      (*id, floor)
    })
    .collect();

  let allotted: Decimal = parts.iter().map(|(_, p)| *p).sum();
  let cents = ((total - allotted) / CENT).round().to_usize().unwrap_or(0);
  fractions.sort_by(|(a, fa), (b, fb)| {
    fb.cmp(fa)
      .then_with(|| weights[*b].1.cmp(&weights[*a].1))
      .then_with(|| a.cmp(b))
  });
  for (idx, _) in fractions.into_iter().take(cents) {
    parts[idx].1 += CENT;
  }
  parts
}
