// src/lib.rs

//! Settlement core for a multi-seller marketplace.
//!
//! Buyers pay for orders that may contain items from several sellers. The
//! core captures payments through a gateway, splits each payment into a
//! platform commission and per-seller earnings, handles full and partial
//! refunds, and pays sellers out of their accumulated earnings. Every money
//! movement is written to an append-only ledger in the same transaction as
//! the entity change it records.
//!
//! Each operation runs as a named pipeline of async steps (see [`workflow`])
//! over a typed context. The steps live in [`pipelines`]; [`SettlementService`]
//! is the entry point.

pub mod workflow;

pub mod commission;
pub mod config;
pub mod directory;
pub mod error;
pub mod fees;
pub mod gateway;
pub mod ledger;
pub mod money;
pub mod notify;
pub mod order_state;
pub mod pipelines;
pub mod results;
pub mod service;
pub mod store;

// --- Re-exports for the Public API ---

pub use crate::config::SettlementConfig;
pub use crate::directory::{Directory, InMemoryDirectory, PgDirectory, ProductListing, SellerAccount};
pub use crate::error::{Result, SettlementError};
pub use crate::fees::{FeeRule, FeeSchedule};
pub use crate::gateway::{CaptureRequest, DisbursementRequest, GatewayOutcome, PaymentGateway, SimulatedGateway};
pub use crate::ledger::{
  EarningsKind, FinancialTransaction, Order, OrderItem, OrderStatus, Payment, PaymentMethod, PaymentStatus, Payout,
  PayoutStatus, SellerBalance, SellerEarningsEntry, TransactionStatus, TransactionType,
};
pub use crate::notify::{Notification, NotificationCategory, NotificationSink, TracingNotifier};
pub use crate::order_state::Actor;
pub use crate::pipelines::OrderLine;
pub use crate::results::{PaymentResult, PayoutResult, SellerSummary, SkippedSeller, WeeklyPayoutReport};
pub use crate::service::SettlementService;
pub use crate::store::{LedgerStore, LedgerTx, MemoryLedgerStore, PaymentStatistics, PgLedgerStore};
pub use crate::workflow::{ContextData, Pipeline, PipelineControl, PipelineRegistry, PipelineResult, WorkflowError};

/// A prelude for convenient importing of commonly used settlement types.
pub mod prelude {
  pub use crate::{
    Actor, ContextData, Order, OrderLine, OrderStatus, Payment, PaymentMethod, PaymentResult, PaymentStatus, Payout,
    PayoutStatus, Pipeline, PipelineControl, PipelineResult, Result, SettlementConfig, SettlementError,
    SettlementService,
  };
}
