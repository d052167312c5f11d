//! Append-only persistence of search results.
//!
//! A [`ResultStore`] accepts only `Verified<Product>` batches, so anything it
//! writes has been through title, price, and url sanitization. Two backends:
//! - [`SqliteStore`]: the `products` table behind a `sqlx` pool
//! - [`MemoryStore`]: an in-process vector, for tests and database-less runs

use std::str::FromStr;

use async_trait::async_trait;
use parking_lot::Mutex;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::debug;

use crate::{Product, Verified};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS products (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    price TEXT NOT NULL,
    url TEXT NOT NULL
)
"#;

const INSERT_SQL: &str = "INSERT INTO products (title, price, url) VALUES (?, ?, ?)";

/// Errors raised by a result store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database rejected an operation.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The connection string could not be used.
    #[error("invalid database url: {0}")]
    InvalidUrl(String),
}

/// Append-only sink for sanitized products.
///
/// The signature takes `&[Verified<Product>]`: raw or tainted products
/// cannot be written.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Persists a whole batch as one append.
    ///
    /// An empty batch is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the batch could not be written. Nothing from a
    /// failed batch is kept.
    async fn append(&self, products: &[Verified<Product>]) -> Result<(), StoreError>;
}

/// In-memory result store.
///
/// # Examples
///
/// ```
/// use item_search_proxy::MemoryStore;
///
/// let store = MemoryStore::new();
/// assert!(store.is_empty());
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    products: Mutex<Vec<Product>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored products.
    pub fn len(&self) -> usize {
        self.products.lock().len()
    }

    /// Returns `true` if nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.products.lock().is_empty()
    }

    /// Returns a copy of everything stored so far, in insertion order.
    pub fn snapshot(&self) -> Vec<Product> {
        self.products.lock().clone()
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn append(&self, products: &[Verified<Product>]) -> Result<(), StoreError> {
        self.products
            .lock()
            .extend(products.iter().map(|p| p.as_ref().clone()));
        Ok(())
    }
}

/// SQLite-backed result store.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if missing) the database at `url` and ensures the
    /// `products` table exists.
    ///
    /// `sqlite::memory:` gives a private in-memory database, which is pinned
    /// to a single connection so every query sees the same data.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the url is invalid or the database cannot be
    /// opened or initialized.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        if !url.starts_with("sqlite:") {
            return Err(StoreError::InvalidUrl("expected a sqlite: url".to_string()));
        }

        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StoreError::InvalidUrl(e.to_string()))?
            .create_if_missing(true);

        let max_connections = if url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        sqlx::query(SCHEMA_SQL).execute(&pool).await?;

        Ok(Self { pool })
    }

    /// Returns every stored product in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the query fails.
    pub async fn all(&self) -> Result<Vec<Product>, StoreError> {
        let rows: Vec<(String, String, String)> =
            sqlx::query_as("SELECT title, price, url FROM products ORDER BY id")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows
            .into_iter()
            .map(|(title, price, url)| Product { title, price, url })
            .collect())
    }
}

#[async_trait]
impl ResultStore for SqliteStore {
    async fn append(&self, products: &[Verified<Product>]) -> Result<(), StoreError> {
        if products.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for product in products {
            let product = product.as_ref();
            sqlx::query(INSERT_SQL)
                .bind(&product.title)
                .bind(&product.price)
                .bind(&product.url)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        debug!(count = products.len(), "persisted products");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verified(title: &str) -> Verified<Product> {
        Verified::new_unchecked(Product {
            title: title.to_string(),
            price: "10 USD".to_string(),
            url: "http://x".to_string(),
        })
    }

    #[tokio::test]
    async fn memory_store_appends_in_order() {
        let store = MemoryStore::new();

        store
            .append(&[verified("one"), verified("two")])
            .await
            .expect("memory append never fails");
        store
            .append(&[verified("three")])
            .await
            .expect("memory append never fails");

        let titles: Vec<String> = store.snapshot().into_iter().map(|p| p.title).collect();
        assert_eq!(titles, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn memory_store_empty_batch_is_noop() {
        let store = MemoryStore::new();

        store.append(&[]).await.expect("memory append never fails");

        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn sqlite_store_persists_batch() {
        let store = SqliteStore::connect("sqlite::memory:")
            .await
            .expect("in-memory database opens");

        store
            .append(&[verified("Phone"), verified("Case")])
            .await
            .expect("insert succeeds");

        let rows = store.all().await.expect("select succeeds");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].title, "Phone");
        assert_eq!(rows[1].title, "Case");
        assert_eq!(rows[1].price, "10 USD");
    }

    #[tokio::test]
    async fn sqlite_store_binds_values_literally() {
        let store = SqliteStore::connect("sqlite::memory:")
            .await
            .expect("in-memory database opens");

        let hostile = "x'); DROP TABLE products; --";
        store
            .append(&[verified(hostile)])
            .await
            .expect("insert succeeds");

        let rows = store.all().await.expect("table still exists");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, hostile);
    }

    #[tokio::test]
    async fn sqlite_store_rejects_bad_url() {
        let result = SqliteStore::connect("postgres://nope").await;

        assert!(matches!(result, Err(StoreError::InvalidUrl(_))));
    }
}
