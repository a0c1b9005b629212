// server/src/web/handlers/mod.rs

pub mod extractors;
pub mod order_handlers;
pub mod payment_handlers;
pub mod payout_handlers;
pub mod seller_handlers;
