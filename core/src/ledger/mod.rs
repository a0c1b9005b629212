// core/src/ledger/mod.rs

//! Settlement records: orders, payments, payouts, the append-only
//! financial ledger and the seller earnings sub-ledger.
//!
//! These are plain data. Derived fields are maintained by the processors
//! (`commission::recompute`, `fees::recompute_net`), never by the records.

pub mod earnings;
pub mod order;
pub mod payment;
pub mod payout;
pub mod transaction;

pub use earnings::{EarningsKind, SellerBalance, SellerEarningsEntry};
pub use order::{Order, OrderItem, OrderStatus};
pub use payment::{Payment, PaymentMethod, PaymentStatus};
pub use payout::{Payout, PayoutStatus};
pub use transaction::{FinancialTransaction, TransactionStatus, TransactionType};

use uuid::Uuid;

/// `<prefix>` followed by eight uppercase hex characters, e.g. `TXN_1A2B3C4D`.
pub fn generate_reference(prefix: &str) -> String {
  let simple = Uuid::new_v4().simple().to_string().to_uppercase();
  format!("{prefix}{}", &simple[..8])
}
