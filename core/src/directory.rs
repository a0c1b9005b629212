// core/src/directory.rs

//! Read-only lookups into the catalog and user accounts.

use async_trait::async_trait;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ProductListing {
  pub id: Uuid,
  pub seller_id: Uuid,
  pub title: String,
  pub price: Decimal,
  pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SellerAccount {
  pub user_id: Uuid,
  pub display_name: String,
  pub default_payout_method: Option<String>,
}

#[async_trait]
pub trait Directory: Send + Sync {
  async fn product(&self, product_id: Uuid) -> Result<Option<ProductListing>>;

  async fn seller(&self, seller_id: Uuid) -> Result<Option<SellerAccount>>;

  async fn user_exists(&self, user_id: Uuid) -> Result<bool>;
}

/// Directory held in process memory; fixtures and the `memory` backend use it.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
  products: RwLock<HashMap<Uuid, ProductListing>>,
  sellers: RwLock<HashMap<Uuid, SellerAccount>>,
  users: RwLock<HashMap<Uuid, String>>,
}

impl InMemoryDirectory {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn add_user(&self, user_id: Uuid, name: &str) {
    self.users.write().insert(user_id, name.to_string());
  }

  pub fn add_seller(&self, account: SellerAccount) {
    self.users.write().insert(account.user_id, account.display_name.clone());
    self.sellers.write().insert(account.user_id, account);
  }

  pub fn add_product(&self, listing: ProductListing) {
    self.products.write().insert(listing.id, listing);
  }
}

#[async_trait]
impl Directory for InMemoryDirectory {
  async fn product(&self, product_id: Uuid) -> Result<Option<ProductListing>> {
    Ok(self.products.read().get(&product_id).cloned())
  }

  async fn seller(&self, seller_id: Uuid) -> Result<Option<SellerAccount>> {
    Ok(self.sellers.read().get(&seller_id).cloned())
  }

  async fn user_exists(&self, user_id: Uuid) -> Result<bool> {
    Ok(self.users.read().contains_key(&user_id))
  }
}

/// Directory backed by the `users`, `seller_profiles` and `products` tables.
#[derive(Debug, Clone)]
pub struct PgDirectory {
  pool: PgPool,
}

impl PgDirectory {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }
}

#[async_trait]
impl Directory for PgDirectory {
  async fn product(&self, product_id: Uuid) -> Result<Option<ProductListing>> {
    let listing = sqlx::query_as::<_, ProductListing>(
      "SELECT id, seller_id, title, price, active FROM products WHERE id = $1",
    )
    .bind(product_id)
    .fetch_optional(&self.pool)
    .await?;
    Ok(listing)
  }

  async fn seller(&self, seller_id: Uuid) -> Result<Option<SellerAccount>> {
    let account = sqlx::query_as::<_, SellerAccount>(
      "SELECT u.id AS user_id, u.display_name, sp.default_payout_method \
       FROM users u JOIN seller_profiles sp ON sp.user_id = u.id WHERE u.id = $1",
    )
    .bind(seller_id)
    .fetch_optional(&self.pool)
    .await?;
    Ok(account)
  }

  async fn user_exists(&self, user_id: Uuid) -> Result<bool> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
      .bind(user_id)
      .fetch_one(&self.pool)
      .await?;
    Ok(exists)
  }
}
