// core/src/store/postgres.rs

//! Postgres ledger store. Row locks come from `SELECT ... FOR UPDATE`,
//! per-seller serialization from `pg_advisory_xact_lock`; both are released
//! when the transaction ends.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::{event, instrument, Level};
use uuid::Uuid;

use super::{LedgerStore, LedgerTx, PaymentStatistics};
use crate::error::{Result, SettlementError};
use crate::ledger::{
  FinancialTransaction, Order, OrderItem, OrderStatus, Payment, Payout, SellerBalance, SellerEarningsEntry,
};

const ORDER_COLUMNS: &str = "id, buyer_id, total_amount, status, payment_id, created_at, updated_at";

const ORDER_ITEM_COLUMNS: &str = "id, order_id, product_id, seller_id, title, quantity, unit_price";

const PAYMENT_COLUMNS: &str = "id, order_id, buyer_id, amount, status, payment_method, transaction_id, \
  payment_gateway, gateway_response, commission_rate, commission_amount, seller_earnings, refunded_amount, \
  version, payment_date, refund_date, created_at, updated_at";

const PAYOUT_COLUMNS: &str = "id, seller_id, amount, transaction_fee, net_amount, status, payout_method, \
  payout_reference, failure_reason, period_start, period_end, estimated_arrival, processed_date, created_at, updated_at";

const TRANSACTION_COLUMNS: &str = "id, transaction_type, amount, currency, user_id, payment_id, payout_id, \
  description, reference_id, status, transaction_date";

const EARNINGS_COLUMNS: &str = "id, seller_id, payment_id, order_id, kind, amount, created_at";

const SELLER_BALANCE_SQL: &str = "SELECT \
  COALESCE((SELECT SUM(amount) FROM seller_earnings WHERE seller_id = $1 AND kind = 'CREDIT'), 0) AS credited, \
  COALESCE((SELECT SUM(amount) FROM seller_earnings WHERE seller_id = $1 AND kind = 'DEBIT'), 0) AS debited, \
  COALESCE((SELECT SUM(amount) FROM payouts WHERE seller_id = $1 AND status IN ('PENDING', 'PROCESSING')), 0) AS reserved, \
  COALESCE((SELECT SUM(amount) FROM payouts WHERE seller_id = $1 AND status = 'COMPLETED'), 0) AS paid_out, \
  (SELECT COUNT(DISTINCT payment_id) FROM seller_earnings WHERE seller_id = $1 AND kind = 'CREDIT') AS order_count";

#[derive(FromRow)]
struct BalanceRow {
  credited: Decimal,
  debited: Decimal,
  reserved: Decimal,
  paid_out: Decimal,
  order_count: i64,
}

impl BalanceRow {
  fn into_balance(self, seller_id: Uuid) -> SellerBalance {
    SellerBalance {
      seller_id,
      credited: self.credited,
      debited: self.debited,
      reserved: self.reserved,
      paid_out: self.paid_out,
      order_count: self.order_count,
    }
  }
}

/// Key for `pg_advisory_xact_lock`, taken from the high half of the seller id.
fn seller_lock_key(seller_id: Uuid) -> i64 {
  let (high, _) = seller_id.as_u64_pair();
  high as i64
}

#[derive(Debug, Clone)]
pub struct PgLedgerStore {
  pool: PgPool,
}

impl PgLedgerStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  pub fn pool(&self) -> &PgPool {
    &self.pool
  }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
  async fn begin(&self) -> Result<Box<dyn LedgerTx>> {
    let tx = self.pool.begin().await?;
    Ok(Box::new(PgTx { tx }))
  }

  async fn order(&self, order_id: Uuid) -> Result<Option<Order>> {
    let order = sqlx::query_as::<_, Order>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
      .bind(order_id)
      .fetch_optional(&self.pool)
      .await?;
    let Some(mut order) = order else {
      return Ok(None);
    };
    order.items = sqlx::query_as::<_, OrderItem>(&format!(
      "SELECT {ORDER_ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY position"
    ))
    .bind(order_id)
    .fetch_all(&self.pool)
    .await?;
    Ok(Some(order))
  }

  async fn payment(&self, payment_id: Uuid) -> Result<Option<Payment>> {
    Ok(
      sqlx::query_as::<_, Payment>(&format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"))
        .bind(payment_id)
        .fetch_optional(&self.pool)
        .await?,
    )
  }

  async fn payout(&self, payout_id: Uuid) -> Result<Option<Payout>> {
    Ok(
      sqlx::query_as::<_, Payout>(&format!("SELECT {PAYOUT_COLUMNS} FROM payouts WHERE id = $1"))
        .bind(payout_id)
        .fetch_optional(&self.pool)
        .await?,
    )
  }

  async fn payments_for_buyer(&self, buyer_id: Uuid) -> Result<Vec<Payment>> {
    Ok(
      sqlx::query_as::<_, Payment>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE buyer_id = $1 ORDER BY created_at DESC"
      ))
      .bind(buyer_id)
      .fetch_all(&self.pool)
      .await?,
    )
  }

  async fn payouts_for_seller(&self, seller_id: Uuid) -> Result<Vec<Payout>> {
    Ok(
      sqlx::query_as::<_, Payout>(&format!(
        "SELECT {PAYOUT_COLUMNS} FROM payouts WHERE seller_id = $1 ORDER BY created_at DESC"
      ))
      .bind(seller_id)
      .fetch_all(&self.pool)
      .await?,
    )
  }

  async fn ledger_for_payment(&self, payment_id: Uuid) -> Result<Vec<FinancialTransaction>> {
    Ok(
      sqlx::query_as::<_, FinancialTransaction>(&format!(
        "SELECT {TRANSACTION_COLUMNS} FROM financial_transactions WHERE payment_id = $1 ORDER BY transaction_date, id"
      ))
      .bind(payment_id)
      .fetch_all(&self.pool)
      .await?,
    )
  }

  async fn ledger_for_payout(&self, payout_id: Uuid) -> Result<Vec<FinancialTransaction>> {
    Ok(
      sqlx::query_as::<_, FinancialTransaction>(&format!(
        "SELECT {TRANSACTION_COLUMNS} FROM financial_transactions WHERE payout_id = $1 ORDER BY transaction_date, id"
      ))
      .bind(payout_id)
      .fetch_all(&self.pool)
      .await?,
    )
  }

  async fn earnings_for_payment(&self, payment_id: Uuid) -> Result<Vec<SellerEarningsEntry>> {
    Ok(
      sqlx::query_as::<_, SellerEarningsEntry>(&format!(
        "SELECT {EARNINGS_COLUMNS} FROM seller_earnings WHERE payment_id = $1 ORDER BY created_at, id"
      ))
      .bind(payment_id)
      .fetch_all(&self.pool)
      .await?,
    )
  }

  async fn seller_balance(&self, seller_id: Uuid) -> Result<SellerBalance> {
    let row = sqlx::query_as::<_, BalanceRow>(SELLER_BALANCE_SQL)
      .bind(seller_id)
      .fetch_one(&self.pool)
      .await?;
    Ok(row.into_balance(seller_id))
  }

  async fn sellers_with_earnings(&self) -> Result<Vec<Uuid>> {
    Ok(
      sqlx::query_scalar::<_, Uuid>("SELECT DISTINCT seller_id FROM seller_earnings ORDER BY seller_id")
        .fetch_all(&self.pool)
        .await?,
    )
  }

  async fn payment_statistics(&self) -> Result<PaymentStatistics> {
    Ok(
      sqlx::query_as::<_, PaymentStatistics>(
        "SELECT \
           COUNT(*) AS total_payments, \
           COUNT(*) FILTER (WHERE status = 'PENDING') AS pending, \
           COUNT(*) FILTER (WHERE status = 'COMPLETED') AS completed, \
           COUNT(*) FILTER (WHERE status = 'FAILED') AS failed, \
           COUNT(*) FILTER (WHERE status = 'REFUNDED') AS refunded, \
           COUNT(*) FILTER (WHERE status = 'PARTIALLY_REFUNDED') AS partially_refunded, \
           COALESCE(SUM(amount) FILTER (WHERE status IN ('COMPLETED', 'PARTIALLY_REFUNDED', 'REFUNDED')), 0) AS gross_volume, \
           COALESCE(SUM(commission_amount) FILTER (WHERE status IN ('COMPLETED', 'PARTIALLY_REFUNDED', 'REFUNDED')), 0) AS commission_earned, \
           COALESCE(SUM(refunded_amount) FILTER (WHERE status IN ('COMPLETED', 'PARTIALLY_REFUNDED', 'REFUNDED')), 0) AS refunded_volume \
         FROM payments",
      )
      .fetch_one(&self.pool)
      .await?,
    )
  }
}

struct PgTx {
  tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTx for PgTx {
  async fn lock_order(&mut self, order_id: Uuid) -> Result<Option<Order>> {
    let order = sqlx::query_as::<_, Order>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"))
      .bind(order_id)
      .fetch_optional(&mut *self.tx)
      .await?;
    let Some(mut order) = order else {
      return Ok(None);
    };
    order.items = sqlx::query_as::<_, OrderItem>(&format!(
      "SELECT {ORDER_ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY position"
    ))
    .bind(order_id)
    .fetch_all(&mut *self.tx)
    .await?;
    Ok(Some(order))
  }

  async fn lock_payment(&mut self, payment_id: Uuid) -> Result<Option<Payment>> {
    Ok(
      sqlx::query_as::<_, Payment>(&format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1 FOR UPDATE"))
        .bind(payment_id)
        .fetch_optional(&mut *self.tx)
        .await?,
    )
  }

  async fn lock_payout(&mut self, payout_id: Uuid) -> Result<Option<Payout>> {
    Ok(
      sqlx::query_as::<_, Payout>(&format!("SELECT {PAYOUT_COLUMNS} FROM payouts WHERE id = $1 FOR UPDATE"))
        .bind(payout_id)
        .fetch_optional(&mut *self.tx)
        .await?,
    )
  }

  #[instrument(name = "PgTx::lock_seller", skip(self))]
  async fn lock_seller(&mut self, seller_id: Uuid) -> Result<()> {
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
      .bind(seller_lock_key(seller_id))
      .execute(&mut *self.tx)
      .await?;
    event!(Level::TRACE, "Seller advisory lock acquired.");
    Ok(())
  }

  async fn seller_balance(&mut self, seller_id: Uuid) -> Result<SellerBalance> {
    let row = sqlx::query_as::<_, BalanceRow>(SELLER_BALANCE_SQL)
      .bind(seller_id)
      .fetch_one(&mut *self.tx)
      .await?;
    Ok(row.into_balance(seller_id))
  }

  async fn earnings_for_payment(&mut self, payment_id: Uuid) -> Result<Vec<SellerEarningsEntry>> {
    Ok(
      sqlx::query_as::<_, SellerEarningsEntry>(&format!(
        "SELECT {EARNINGS_COLUMNS} FROM seller_earnings WHERE payment_id = $1 ORDER BY created_at, id"
      ))
      .bind(payment_id)
      .fetch_all(&mut *self.tx)
      .await?,
    )
  }

  async fn order_has_captured_payment(&mut self, order_id: Uuid) -> Result<bool> {
    Ok(
      sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM payments WHERE order_id = $1 \
         AND status IN ('COMPLETED', 'PARTIALLY_REFUNDED', 'REFUNDED'))",
      )
      .bind(order_id)
      .fetch_one(&mut *self.tx)
      .await?,
    )
  }

  async fn insert_order(&mut self, order: &Order) -> Result<()> {
    sqlx::query(
      "INSERT INTO orders (id, buyer_id, total_amount, status, payment_id, created_at, updated_at) \
       VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(order.id)
    .bind(order.buyer_id)
    .bind(order.total_amount)
    .bind(order.status)
    .bind(order.payment_id)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&mut *self.tx)
    .await?;

    for (position, item) in order.items.iter().enumerate() {
      sqlx::query(
        "INSERT INTO order_items (id, order_id, position, product_id, seller_id, title, quantity, unit_price) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
      )
      .bind(item.id)
      .bind(order.id)
      .bind(position as i32)
      .bind(item.product_id)
      .bind(item.seller_id)
      .bind(&item.title)
      .bind(item.quantity)
      .bind(item.unit_price)
      .execute(&mut *self.tx)
      .await?;
    }
    Ok(())
  }

  async fn update_order_status(&mut self, order_id: Uuid, status: OrderStatus, payment_id: Option<Uuid>) -> Result<()> {
    let result = sqlx::query(
      "UPDATE orders SET status = $2, payment_id = COALESCE($3, payment_id), updated_at = now() WHERE id = $1",
    )
    .bind(order_id)
    .bind(status)
    .bind(payment_id)
    .execute(&mut *self.tx)
    .await?;
    if result.rows_affected() == 0 {
      return Err(SettlementError::not_found(format!("order {order_id} does not exist")));
    }
    Ok(())
  }

  async fn insert_payment(&mut self, payment: &Payment) -> Result<()> {
    sqlx::query(&format!(
      "INSERT INTO payments ({PAYMENT_COLUMNS}) \
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)"
    ))
    .bind(payment.id)
    .bind(payment.order_id)
    .bind(payment.buyer_id)
    .bind(payment.amount)
    .bind(payment.status)
    .bind(payment.payment_method)
    .bind(&payment.transaction_id)
    .bind(&payment.payment_gateway)
    .bind(&payment.gateway_response)
    .bind(payment.commission_rate)
    .bind(payment.commission_amount)
    .bind(payment.seller_earnings)
    .bind(payment.refunded_amount)
    .bind(payment.version)
    .bind(payment.payment_date)
    .bind(payment.refund_date)
    .bind(payment.created_at)
    .bind(payment.updated_at)
    .execute(&mut *self.tx)
    .await?;
    Ok(())
  }

  async fn update_payment(&mut self, payment: &Payment) -> Result<()> {
    let result = sqlx::query(
      "UPDATE payments SET status = $3, gateway_response = $4, commission_rate = $5, commission_amount = $6, \
         seller_earnings = $7, refunded_amount = $8, payment_date = $9, refund_date = $10, \
         version = version + 1, updated_at = now() \
       WHERE id = $1 AND version = $2",
    )
    .bind(payment.id)
    .bind(payment.version)
    .bind(payment.status)
    .bind(&payment.gateway_response)
    .bind(payment.commission_rate)
    .bind(payment.commission_amount)
    .bind(payment.seller_earnings)
    .bind(payment.refunded_amount)
    .bind(payment.payment_date)
    .bind(payment.refund_date)
    .execute(&mut *self.tx)
    .await?;
    if result.rows_affected() == 0 {
      return Err(SettlementError::Conflict(format!(
        "payment {} was modified concurrently (expected version {})",
        payment.id, payment.version
      )));
    }
    Ok(())
  }

  async fn insert_payout(&mut self, payout: &Payout) -> Result<()> {
    sqlx::query(&format!(
      "INSERT INTO payouts ({PAYOUT_COLUMNS}) \
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)"
    ))
    .bind(payout.id)
    .bind(payout.seller_id)
    .bind(payout.amount)
    .bind(payout.transaction_fee)
    .bind(payout.net_amount)
    .bind(payout.status)
    .bind(&payout.payout_method)
    .bind(&payout.payout_reference)
    .bind(&payout.failure_reason)
    .bind(payout.period_start)
    .bind(payout.period_end)
    .bind(payout.estimated_arrival)
    .bind(payout.processed_date)
    .bind(payout.created_at)
    .bind(payout.updated_at)
    .execute(&mut *self.tx)
    .await?;
    Ok(())
  }

  async fn update_payout(&mut self, payout: &Payout) -> Result<()> {
    let result = sqlx::query(
      "UPDATE payouts SET amount = $2, transaction_fee = $3, net_amount = $4, status = $5, failure_reason = $6, \
         processed_date = $7, updated_at = now() \
       WHERE id = $1",
    )
    .bind(payout.id)
    .bind(payout.amount)
    .bind(payout.transaction_fee)
    .bind(payout.net_amount)
    .bind(payout.status)
    .bind(&payout.failure_reason)
    .bind(payout.processed_date)
    .execute(&mut *self.tx)
    .await?;
    if result.rows_affected() == 0 {
      return Err(SettlementError::not_found(format!("payout {} does not exist", payout.id)));
    }
    Ok(())
  }

  async fn append_transaction(&mut self, entry: &FinancialTransaction) -> Result<()> {
    sqlx::query(&format!(
      "INSERT INTO financial_transactions ({TRANSACTION_COLUMNS}) \
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
    ))
    .bind(entry.id)
    .bind(entry.transaction_type)
    .bind(entry.amount)
    .bind(&entry.currency)
    .bind(entry.user_id)
    .bind(entry.payment_id)
    .bind(entry.payout_id)
    .bind(&entry.description)
    .bind(&entry.reference_id)
    .bind(entry.status)
    .bind(entry.transaction_date)
    .execute(&mut *self.tx)
    .await?;
    Ok(())
  }

  async fn append_earnings(&mut self, entry: &SellerEarningsEntry) -> Result<()> {
    sqlx::query(&format!(
      "INSERT INTO seller_earnings ({EARNINGS_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7)"
    ))
    .bind(entry.id)
    .bind(entry.seller_id)
    .bind(entry.payment_id)
    .bind(entry.order_id)
    .bind(entry.kind)
    .bind(entry.amount)
    .bind(entry.created_at)
    .execute(&mut *self.tx)
    .await?;
    Ok(())
  }

  async fn commit(self: Box<Self>) -> Result<()> {
    self.tx.commit().await?;
    Ok(())
  }
}
