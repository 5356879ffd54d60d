mod models;
pub mod store;

pub use models::*;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::info;

use crate::config::DatabaseConfig;

pub type DbPool = SqlitePool;

/// Split a migration file into statements.
///
/// Comment lines are dropped before splitting on `;`, so a comment may contain
/// a semicolon. Semicolons inside string literals are not supported.
fn migration_statements(sql: &str) -> Vec<String> {
    let code: String = sql
        .lines()
        .filter(|line| !line.trim().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n");

    code.split(';')
        .map(str::trim)
        .filter(|statement| !statement.is_empty())
        .map(str::to_string)
        .collect()
}

/// Execute a SQL migration file statement by statement
async fn execute_sql(pool: &SqlitePool, sql: &str) -> Result<()> {
    for statement in migration_statements(sql) {
        sqlx::query(&statement).execute(pool).await?;
    }
    Ok(())
}

/// Open the pool described by `config` and bring the schema up to date.
pub async fn init(config: &DatabaseConfig) -> Result<DbPool> {
    let url = match &config.url {
        Some(url) => url.clone(),
        None => {
            std::fs::create_dir_all(&config.data_dir).with_context(|| {
                format!("Failed to create data directory: {}", config.data_dir.display())
            })?;
            format!("sqlite:{}", config.data_dir.join("shopcart.db").display())
        }
    };

    info!(url = %url, "Initializing database");

    let in_memory = url.contains(":memory:");
    let mut options = SqliteConnectOptions::from_str(&url)
        .with_context(|| format!("Invalid database URL: {}", url))?
        .create_if_missing(true)
        .foreign_keys(true);
    if !in_memory {
        // WAL for concurrent readers alongside the writer
        options = options
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);
    }

    let mut pool_options = SqlitePoolOptions::new().max_connections(config.max_connections);
    if in_memory {
        // Each connection to :memory: is its own database; keep exactly one alive
        pool_options = pool_options
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
    }

    let pool = pool_options
        .connect_with(options)
        .await
        .context("Failed to connect to database")?;

    run_migrations(&pool).await?;

    info!("Database initialized successfully");
    Ok(pool)
}

async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    info!("Running database migrations...");

    // Migration 001: users, addresses, orders, products, cart lines
    execute_sql(pool, include_str!("../../migrations/001_initial.sql"))
        .await
        .context("Migration 001 failed")?;

    info!("Migrations completed");
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::time::Duration;

    use super::*;
    use crate::db::store::SqliteStore;

    pub async fn memory_pool() -> DbPool {
        let config = DatabaseConfig {
            url: Some("sqlite::memory:".to_string()),
            ..DatabaseConfig::default()
        };
        init(&config).await.unwrap()
    }

    pub async fn memory_store() -> SqliteStore {
        SqliteStore::new(memory_pool().await, Duration::from_secs(5))
    }

    pub fn sample_user(email: &str) -> User {
        let now = chrono::Utc::now().to_rfc3339();
        User {
            id: uuid::Uuid::new_v4().to_string(),
            first_name: "Alice".to_string(),
            last_name: "Doe".to_string(),
            email: email.to_string(),
            password_hash: "not-a-real-hash".to_string(),
            token: String::new(),
            refresh_token: String::new(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn sample_product(name: &str, price: f64) -> Product {
        let now = chrono::Utc::now().to_rfc3339();
        Product {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            price,
            rating: 4.0,
            image_url: format!("https://img.example/{}.png", name.to_lowercase().replace(' ', "-")),
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let pool = test_support::memory_pool().await;
        run_migrations(&pool).await.unwrap();

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        let names: Vec<_> = tables.into_iter().map(|(n,)| n).collect();
        assert_eq!(names, vec!["addresses", "cart_lines", "orders", "products", "users"]);
    }

    #[test]
    fn test_comment_semicolons_do_not_split_statements() {
        let sql = "-- Parents first; children cascade.\n\
                   CREATE TABLE a (id TEXT);\n\
                   -- trailing note; with a semicolon\n\
                   CREATE INDEX idx_a ON a(id);\n";
        assert_eq!(
            migration_statements(sql),
            vec!["CREATE TABLE a (id TEXT)", "CREATE INDEX idx_a ON a(id)"]
        );
    }

    #[test]
    fn test_initial_migration_statements_are_sql() {
        let statements = migration_statements(include_str!("../../migrations/001_initial.sql"));
        assert!(!statements.is_empty());
        for statement in statements {
            assert!(
                statement.starts_with("CREATE"),
                "unexpected statement: {}",
                statement
            );
        }
    }
}
