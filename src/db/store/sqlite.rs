//! sqlx/SQLite implementation of the store capabilities.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

use super::{CartStore, ProductStore, StoreError, UserStore};
use crate::db::{Address, CartLine, CartMerge, DbPool, Order, Product, ProfileUpdate, User};

/// Store backed by a pooled SQLite connection. Every operation runs under `timeout`.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: DbPool,
    timeout: Duration,
}

impl SqliteStore {
    pub fn new(pool: DbPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Run a query under the store deadline. Dropping the returned future cancels the query.
    async fn bounded<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, sqlx::Error>> + Send,
    {
        match tokio::time::timeout(self.timeout, op).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => {
                tracing::warn!(timeout = ?self.timeout, "Store operation timed out");
                Err(StoreError::Timeout(self.timeout))
            }
        }
    }
}

#[async_trait]
impl UserStore for SqliteStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        self.bounded(
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool),
        )
        .await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.bounded(
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
                .bind(email)
                .fetch_optional(&self.pool),
        )
        .await
    }

    async fn email_exists(&self, email: &str) -> Result<bool, StoreError> {
        let count: i64 = self
            .bounded(
                sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ?")
                    .bind(email)
                    .fetch_one(&self.pool),
            )
            .await?;
        Ok(count > 0)
    }

    async fn insert(&self, user: &User) -> Result<(), StoreError> {
        self.bounded(
            sqlx::query(
                r#"
                INSERT INTO users (id, first_name, last_name, email, password_hash, token, refresh_token, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&user.id)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.token)
            .bind(&user.refresh_token)
            .bind(&user.created_at)
            .bind(&user.updated_at)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn update_tokens(
        &self,
        user_id: &str,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<u64, StoreError> {
        let now = chrono::Utc::now().to_rfc3339();
        let result = self
            .bounded(
                sqlx::query("UPDATE users SET token = ?, refresh_token = ?, updated_at = ? WHERE id = ?")
                    .bind(access_token)
                    .bind(refresh_token)
                    .bind(&now)
                    .bind(user_id)
                    .execute(&self.pool),
            )
            .await?;
        Ok(result.rows_affected())
    }

    async fn update_access_token(
        &self,
        user_id: &str,
        refresh_token: &str,
        access_token: &str,
    ) -> Result<u64, StoreError> {
        let result = self
            .bounded(
                sqlx::query("UPDATE users SET token = ? WHERE id = ? AND refresh_token = ?")
                    .bind(access_token)
                    .bind(user_id)
                    .bind(refresh_token)
                    .execute(&self.pool),
            )
            .await?;
        Ok(result.rows_affected())
    }

    async fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> Result<u64, StoreError> {
        let pool = &self.pool;
        self.bounded(async move {
            let mut tx = pool.begin().await?;

            let result = sqlx::query(
                "UPDATE users SET first_name = ?, last_name = ?, email = ?, updated_at = ? WHERE id = ?",
            )
            .bind(&update.first_name)
            .bind(&update.last_name)
            .bind(&update.email)
            .bind(&update.updated_at)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                return Ok(0);
            }

            if let Some(addresses) = &update.addresses {
                sqlx::query("DELETE FROM addresses WHERE user_id = ?")
                    .bind(user_id)
                    .execute(&mut *tx)
                    .await?;

                for address in addresses {
                    sqlx::query(
                        r#"
                        INSERT INTO addresses (id, user_id, street, city, state, postal_code, country_code, created_at)
                        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                        "#,
                    )
                    .bind(&address.id)
                    .bind(user_id)
                    .bind(&address.street)
                    .bind(&address.city)
                    .bind(&address.state)
                    .bind(&address.postal_code)
                    .bind(&address.country_code)
                    .bind(&address.created_at)
                    .execute(&mut *tx)
                    .await?;
                }
            }

            tx.commit().await?;
            Ok(result.rows_affected())
        })
        .await
    }

    async fn list_addresses(&self, user_id: &str) -> Result<Vec<Address>, StoreError> {
        self.bounded(
            sqlx::query_as::<_, Address>(
                "SELECT * FROM addresses WHERE user_id = ? ORDER BY created_at ASC, id ASC",
            )
            .bind(user_id)
            .fetch_all(&self.pool),
        )
        .await
    }

    async fn add_address(&self, address: &Address) -> Result<(), StoreError> {
        self.bounded(
            sqlx::query(
                r#"
                INSERT INTO addresses (id, user_id, street, city, state, postal_code, country_code, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&address.id)
            .bind(&address.user_id)
            .bind(&address.street)
            .bind(&address.city)
            .bind(&address.state)
            .bind(&address.postal_code)
            .bind(&address.country_code)
            .bind(&address.created_at)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn clear_addresses(&self, user_id: &str) -> Result<u64, StoreError> {
        let result = self
            .bounded(
                sqlx::query("DELETE FROM addresses WHERE user_id = ?")
                    .bind(user_id)
                    .execute(&self.pool),
            )
            .await?;
        Ok(result.rows_affected())
    }

    async fn remove_address(&self, user_id: &str, address_id: &str) -> Result<u64, StoreError> {
        let result = self
            .bounded(
                sqlx::query("DELETE FROM addresses WHERE id = ? AND user_id = ?")
                    .bind(address_id)
                    .bind(user_id)
                    .execute(&self.pool),
            )
            .await?;
        Ok(result.rows_affected())
    }

    async fn list_orders(&self, user_id: &str) -> Result<Vec<Order>, StoreError> {
        self.bounded(
            sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE user_id = ? ORDER BY created_at DESC")
                .bind(user_id)
                .fetch_all(&self.pool),
        )
        .await
    }
}

#[async_trait]
impl CartStore for SqliteStore {
    async fn list_cart(&self, user_id: &str) -> Result<Vec<CartLine>, StoreError> {
        self.bounded(
            sqlx::query_as::<_, CartLine>(
                "SELECT * FROM cart_lines WHERE user_id = ? ORDER BY created_at ASC, id ASC",
            )
            .bind(user_id)
            .fetch_all(&self.pool),
        )
        .await
    }

    async fn cart_line_exists(&self, user_id: &str, line_id: &str) -> Result<bool, StoreError> {
        let count: i64 = self
            .bounded(
                sqlx::query_scalar("SELECT COUNT(*) FROM cart_lines WHERE id = ? AND user_id = ?")
                    .bind(line_id)
                    .bind(user_id)
                    .fetch_one(&self.pool),
            )
            .await?;
        Ok(count > 0)
    }

    async fn upsert_cart_line(&self, line: &CartLine) -> Result<Option<CartMerge>, StoreError> {
        let row = self
            .bounded(
                sqlx::query_as::<_, CartLine>(
                    r#"
                    INSERT INTO cart_lines (id, user_id, product_id, quantity, created_at, updated_at)
                    VALUES (?, ?, ?, ?, ?, ?)
                    ON CONFLICT(user_id, product_id) DO UPDATE SET
                        quantity = cart_lines.quantity + excluded.quantity,
                        updated_at = excluded.updated_at
                    WHERE cart_lines.quantity <= 9223372036854775807 - excluded.quantity
                    RETURNING id, user_id, product_id, quantity, created_at, updated_at
                    "#,
                )
                .bind(&line.id)
                .bind(&line.user_id)
                .bind(&line.product_id)
                .bind(line.quantity)
                .bind(&line.created_at)
                .bind(&line.updated_at)
                .fetch_optional(&self.pool),
            )
            .await?;

        Ok(row.map(|stored| {
            if stored.id == line.id {
                CartMerge::Created(stored)
            } else {
                CartMerge::Merged(stored)
            }
        }))
    }

    async fn replace_cart_line(
        &self,
        user_id: &str,
        line_id: &str,
        product_id: &str,
        quantity: i64,
        updated_at: &str,
    ) -> Result<u64, StoreError> {
        let result = self
            .bounded(
                sqlx::query(
                    "UPDATE cart_lines SET product_id = ?, quantity = ?, updated_at = ? WHERE id = ? AND user_id = ?",
                )
                .bind(product_id)
                .bind(quantity)
                .bind(updated_at)
                .bind(line_id)
                .bind(user_id)
                .execute(&self.pool),
            )
            .await?;
        Ok(result.rows_affected())
    }

    async fn clear_cart(&self, user_id: &str) -> Result<u64, StoreError> {
        let result = self
            .bounded(
                sqlx::query("DELETE FROM cart_lines WHERE user_id = ?")
                    .bind(user_id)
                    .execute(&self.pool),
            )
            .await?;
        Ok(result.rows_affected())
    }

    async fn remove_cart_line(&self, user_id: &str, line_id: &str) -> Result<u64, StoreError> {
        let result = self
            .bounded(
                sqlx::query("DELETE FROM cart_lines WHERE id = ? AND user_id = ?")
                    .bind(line_id)
                    .bind(user_id)
                    .execute(&self.pool),
            )
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ProductStore for SqliteStore {
    async fn exists(&self, id: &str) -> Result<bool, StoreError> {
        let count: i64 = self
            .bounded(
                sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE id = ?")
                    .bind(id)
                    .fetch_one(&self.pool),
            )
            .await?;
        Ok(count > 0)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Product>, StoreError> {
        self.bounded(
            sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool),
        )
        .await
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Product>, StoreError> {
        self.bounded(
            sqlx::query_as::<_, Product>("SELECT * FROM products WHERE name = ?")
                .bind(name)
                .fetch_optional(&self.pool),
        )
        .await
    }

    async fn insert(&self, product: &Product) -> Result<(), StoreError> {
        self.bounded(
            sqlx::query(
                r#"
                INSERT INTO products (id, name, price, rating, image_url, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&product.id)
            .bind(&product.name)
            .bind(product.price)
            .bind(product.rating)
            .bind(&product.image_url)
            .bind(&product.created_at)
            .bind(&product.updated_at)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn update(&self, product: &Product) -> Result<u64, StoreError> {
        let result = self
            .bounded(
                sqlx::query(
                    "UPDATE products SET name = ?, price = ?, rating = ?, image_url = ?, updated_at = ? WHERE id = ?",
                )
                .bind(&product.name)
                .bind(product.price)
                .bind(product.rating)
                .bind(&product.image_url)
                .bind(&product.updated_at)
                .bind(&product.id)
                .execute(&self.pool),
            )
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, id: &str) -> Result<u64, StoreError> {
        let result = self
            .bounded(
                sqlx::query("DELETE FROM products WHERE id = ?")
                    .bind(id)
                    .execute(&self.pool),
            )
            .await?;
        Ok(result.rows_affected())
    }

    async fn by_price_range(
        &self,
        min: Option<f64>,
        max: Option<f64>,
    ) -> Result<Vec<Product>, StoreError> {
        self.bounded(
            sqlx::query_as::<_, Product>(
                r#"
                SELECT * FROM products
                WHERE (? IS NULL OR price >= ?) AND (? IS NULL OR price <= ?)
                ORDER BY price ASC, name ASC
                "#,
            )
            .bind(min)
            .bind(min)
            .bind(max)
            .bind(max)
            .fetch_all(&self.pool),
        )
        .await
    }

    async fn by_price(&self, price: f64) -> Result<Vec<Product>, StoreError> {
        self.bounded(
            sqlx::query_as::<_, Product>("SELECT * FROM products WHERE price = ? ORDER BY name ASC")
                .bind(price)
                .fetch_all(&self.pool),
        )
        .await
    }

    async fn by_keyword(&self, keyword: &str) -> Result<Vec<Product>, StoreError> {
        self.bounded(
            sqlx::query_as::<_, Product>(
                "SELECT * FROM products WHERE instr(lower(name), lower(?)) > 0 ORDER BY name ASC",
            )
            .bind(keyword)
            .fetch_all(&self.pool),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{memory_store, sample_product, sample_user};

    #[tokio::test]
    async fn test_upsert_creates_then_merges() {
        let store = memory_store().await;
        let user = sample_user("a@x.com");
        UserStore::insert(&store, &user).await.unwrap();

        let first = CartLine::new(&user.id, "product-a", 2);
        let created = store.upsert_cart_line(&first).await.unwrap().unwrap();
        assert!(matches!(created, CartMerge::Created(_)));

        let second = CartLine::new(&user.id, "product-a", 3);
        let merged = store.upsert_cart_line(&second).await.unwrap().unwrap();
        match merged {
            CartMerge::Merged(line) => {
                assert_eq!(line.id, first.id);
                assert_eq!(line.quantity, 5);
            }
            other => panic!("expected merge, got {:?}", other),
        }

        let lines = store.list_cart(&user.id).await.unwrap();
        assert_eq!(lines.len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_refuses_overflowing_merge() {
        let store = memory_store().await;
        let user = sample_user("max@x.com");
        UserStore::insert(&store, &user).await.unwrap();

        let full = CartLine::new(&user.id, "product-a", i64::MAX);
        store.upsert_cart_line(&full).await.unwrap().unwrap();

        let one_more = CartLine::new(&user.id, "product-a", 1);
        assert!(store.upsert_cart_line(&one_more).await.unwrap().is_none());

        let lines = store.list_cart(&user.id).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity, i64::MAX);
    }

    #[tokio::test]
    async fn test_bounded_times_out() {
        let store = SqliteStore::new(
            crate::db::test_support::memory_pool().await,
            Duration::from_millis(20),
        );

        let err = store
            .bounded(std::future::pending::<Result<(), sqlx::Error>>())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Timeout(d) if d == Duration::from_millis(20)));

        let api_err = crate::api::error::ApiError::from(err);
        assert_eq!(api_err.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let store = memory_store().await;
        UserStore::insert(&store, &sample_user("dup@x.com")).await.unwrap();

        let err = UserStore::insert(&store, &sample_user("dup@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict));
    }

    #[tokio::test]
    async fn test_update_access_token_requires_current_refresh_token() {
        let store = memory_store().await;
        let user = sample_user("t@x.com");
        UserStore::insert(&store, &user).await.unwrap();
        store.update_tokens(&user.id, "access-1", "refresh-1").await.unwrap();

        let stale = store
            .update_access_token(&user.id, "refresh-0", "access-2")
            .await
            .unwrap();
        assert_eq!(stale, 0);

        let fresh = store
            .update_access_token(&user.id, "refresh-1", "access-2")
            .await
            .unwrap();
        assert_eq!(fresh, 1);

        let stored = UserStore::find_by_id(&store, &user.id).await.unwrap().unwrap();
        assert_eq!(stored.token, "access-2");
        assert_eq!(stored.refresh_token, "refresh-1");
    }

    #[tokio::test]
    async fn test_replace_cart_line_onto_existing_product_conflicts() {
        let store = memory_store().await;
        let user = sample_user("c@x.com");
        UserStore::insert(&store, &user).await.unwrap();

        let a = CartLine::new(&user.id, "product-a", 1);
        let b = CartLine::new(&user.id, "product-b", 1);
        store.upsert_cart_line(&a).await.unwrap();
        store.upsert_cart_line(&b).await.unwrap();

        let err = store
            .replace_cart_line(&user.id, &b.id, "product-a", 4, "2024-01-01T00:00:00Z")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict));
    }

    #[tokio::test]
    async fn test_cart_lines_are_scoped_to_owner() {
        let store = memory_store().await;
        let owner = sample_user("owner@x.com");
        let other = sample_user("other@x.com");
        UserStore::insert(&store, &owner).await.unwrap();
        UserStore::insert(&store, &other).await.unwrap();

        let line = CartLine::new(&owner.id, "product-a", 1);
        store.upsert_cart_line(&line).await.unwrap();

        assert!(store.cart_line_exists(&owner.id, &line.id).await.unwrap());
        assert!(!store.cart_line_exists(&other.id, &line.id).await.unwrap());
        assert_eq!(store.remove_cart_line(&other.id, &line.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_clear_addresses_leaves_empty_list() {
        let store = memory_store().await;
        let user = sample_user("addr@x.com");
        UserStore::insert(&store, &user).await.unwrap();

        let address = crate::db::AddressRequest {
            street: "1 Main St".to_string(),
            city: "Springfield".to_string(),
            state: "IL".to_string(),
            postal_code: "62701".to_string(),
            country_code: "US".to_string(),
        }
        .into_address(&user.id);
        store.add_address(&address).await.unwrap();
        assert_eq!(store.list_addresses(&user.id).await.unwrap().len(), 1);

        store.clear_addresses(&user.id).await.unwrap();
        assert!(store.list_addresses(&user.id).await.unwrap().is_empty());

        // Clearing an already empty book is not an error
        assert_eq!(store.clear_addresses(&user.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_price_range_sorted_ascending() {
        let store = memory_store().await;
        for (name, price) in [("Lamp", 30.0), ("Mug", 5.0), ("Chair", 80.0), ("Pen", 1.5)] {
            ProductStore::insert(&store, &sample_product(name, price)).await.unwrap();
        }

        let mid = store.by_price_range(Some(2.0), Some(50.0)).await.unwrap();
        let names: Vec<_> = mid.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Mug", "Lamp"]);

        let cheap = store.by_price_range(None, Some(5.0)).await.unwrap();
        assert_eq!(cheap.len(), 2);

        let pricey = store.by_price_range(Some(30.0), None).await.unwrap();
        let names: Vec<_> = pricey.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Lamp", "Chair"]);
    }

    #[tokio::test]
    async fn test_keyword_is_case_insensitive() {
        let store = memory_store().await;
        ProductStore::insert(&store, &sample_product("Blue Coffee Mug", 9.0)).await.unwrap();
        ProductStore::insert(&store, &sample_product("Desk Lamp", 25.0)).await.unwrap();

        let found = store.by_keyword("MUG").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Blue Coffee Mug");

        assert_eq!(store.by_keyword("").await.unwrap().len(), 2);
        assert!(store.by_keyword("sofa").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_profile_replaces_addresses() {
        let store = memory_store().await;
        let user = sample_user("p@x.com");
        UserStore::insert(&store, &user).await.unwrap();

        let old = crate::db::AddressRequest {
            street: "Old St".to_string(),
            city: "Old Town".to_string(),
            state: "OT".to_string(),
            postal_code: "00000".to_string(),
            country_code: "US".to_string(),
        }
        .into_address(&user.id);
        store.add_address(&old).await.unwrap();

        let new = crate::db::AddressRequest {
            street: "New St".to_string(),
            city: "New Town".to_string(),
            state: "NT".to_string(),
            postal_code: "11111".to_string(),
            country_code: "US".to_string(),
        }
        .into_address(&user.id);

        let update = ProfileUpdate {
            first_name: "Annie".to_string(),
            last_name: "Smith".to_string(),
            email: "annie@x.com".to_string(),
            addresses: Some(vec![new]),
            updated_at: chrono::Utc::now().to_rfc3339(),
        };
        assert_eq!(store.update_profile(&user.id, &update).await.unwrap(), 1);

        let addresses = store.list_addresses(&user.id).await.unwrap();
        assert_eq!(addresses.len(), 1);
        assert_eq!(addresses[0].street, "New St");

        let stored = UserStore::find_by_id(&store, &user.id).await.unwrap().unwrap();
        assert_eq!(stored.email, "annie@x.com");
        assert_eq!(stored.first_name, "Annie");
    }
}
