//! Store capabilities injected into the services.
//!
//! Services depend on these traits rather than on a pool, so every component
//! receives its store handle at construction. [`SqliteStore`] implements all
//! three on top of sqlx.

mod sqlite;

pub use sqlite::SqliteStore;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::db::{Address, CartLine, CartMerge, Order, Product, ProfileUpdate, User};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("a record with this identifier already exists")]
    Conflict,
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => StoreError::Conflict,
            _ => StoreError::Database(err),
        }
    }
}

/// Users, their session tokens and the records embedded in a user
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn email_exists(&self, email: &str) -> Result<bool, StoreError>;
    async fn insert(&self, user: &User) -> Result<(), StoreError>;
    /// Overwrite the session pair. Returns the number of matched users.
    async fn update_tokens(
        &self,
        user_id: &str,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<u64, StoreError>;
    /// Replace only the access token, provided `refresh_token` is still the stored one.
    async fn update_access_token(
        &self,
        user_id: &str,
        refresh_token: &str,
        access_token: &str,
    ) -> Result<u64, StoreError>;
    async fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> Result<u64, StoreError>;
    async fn list_addresses(&self, user_id: &str) -> Result<Vec<Address>, StoreError>;
    async fn add_address(&self, address: &Address) -> Result<(), StoreError>;
    async fn clear_addresses(&self, user_id: &str) -> Result<u64, StoreError>;
    async fn remove_address(&self, user_id: &str, address_id: &str) -> Result<u64, StoreError>;
    async fn list_orders(&self, user_id: &str) -> Result<Vec<Order>, StoreError>;
}

/// Cart lines, always addressed through their owning user
#[async_trait]
pub trait CartStore: Send + Sync {
    async fn list_cart(&self, user_id: &str) -> Result<Vec<CartLine>, StoreError>;
    async fn cart_line_exists(&self, user_id: &str, line_id: &str) -> Result<bool, StoreError>;
    /// Insert `line`, or add its quantity to the user's existing line for the same product.
    /// Runs as a single conditional statement; `None` means nothing was written
    /// because the merged quantity would overflow.
    async fn upsert_cart_line(&self, line: &CartLine) -> Result<Option<CartMerge>, StoreError>;
    async fn replace_cart_line(
        &self,
        user_id: &str,
        line_id: &str,
        product_id: &str,
        quantity: i64,
        updated_at: &str,
    ) -> Result<u64, StoreError>;
    async fn clear_cart(&self, user_id: &str) -> Result<u64, StoreError>;
    async fn remove_cart_line(&self, user_id: &str, line_id: &str) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn exists(&self, id: &str) -> Result<bool, StoreError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<Product>, StoreError>;
    async fn find_by_name(&self, name: &str) -> Result<Option<Product>, StoreError>;
    async fn insert(&self, product: &Product) -> Result<(), StoreError>;
    async fn update(&self, product: &Product) -> Result<u64, StoreError>;
    async fn delete(&self, id: &str) -> Result<u64, StoreError>;
    /// Products priced within the inclusive bounds, cheapest first
    async fn by_price_range(
        &self,
        min: Option<f64>,
        max: Option<f64>,
    ) -> Result<Vec<Product>, StoreError>;
    async fn by_price(&self, price: f64) -> Result<Vec<Product>, StoreError>;
    /// Case-insensitive substring match on the product name
    async fn by_keyword(&self, keyword: &str) -> Result<Vec<Product>, StoreError>;
}
