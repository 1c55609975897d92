use crate::config::DatabaseConfig;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info, instrument};

/// Errors returned by the item store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Another insert for the same identifier won the race
    #[error("Saree ID already exists: {0}")]
    DuplicateIdentifier(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// A cataloged saree
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Item {
    /// Surrogate row ID
    pub id: i64,
    /// Scanned or entered saree code
    #[sqlx(rename = "saree_id")]
    pub identifier: String,
    /// When the record was created
    pub created_at: DateTime<Utc>,
}

/// Record store for saree identifiers in SQLite
pub struct ItemStore {
    pool: SqlitePool,
}

impl ItemStore {
    /// Create a new item store with connection pool
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)?.create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout())
            .idle_timeout(Some(config.idle_timeout()))
            .connect_with(options)
            .await?;

        info!(url = %config.url, "Connected to SQLite database");

        Ok(Self { pool })
    }

    /// Single-connection in-memory store with the schema applied.
    ///
    /// The pool never recycles its connection, since dropping it would
    /// discard the database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("./migrations").run(&self.pool).await?;

        info!("Database migrations completed");
        Ok(())
    }

    /// Look up a saree by its identifier
    pub async fn find_by_identifier(&self, identifier: &str) -> Result<Option<Item>> {
        let item = sqlx::query_as::<_, Item>(
            r#"
            SELECT id, saree_id, created_at
            FROM sarees
            WHERE saree_id = ?1
            "#,
        )
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await?;

        Ok(item)
    }

    /// Insert a new saree record
    ///
    /// Fails with [`StoreError::DuplicateIdentifier`] when the identifier is
    /// already present.
    #[instrument(skip(self))]
    pub async fn create(&self, identifier: &str) -> Result<Item> {
        let result = sqlx::query_as::<_, Item>(
            r#"
            INSERT INTO sarees (saree_id, created_at)
            VALUES (?1, ?2)
            RETURNING id, saree_id, created_at
            "#,
        )
        .bind(identifier)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(item) => {
                debug!(id = item.id, "Saree record created");
                metrics::counter!("catalog.items.created").increment(1);
                Ok(item)
            }
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(StoreError::DuplicateIdentifier(identifier.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Find the record for `identifier`, creating it when absent.
    ///
    /// A concurrent insert of the same identifier is not an error: the row
    /// written by the other request is returned instead.
    #[instrument(skip(self))]
    pub async fn ensure(&self, identifier: &str) -> Result<Item> {
        if let Some(item) = self.find_by_identifier(identifier).await? {
            return Ok(item);
        }

        match self.create(identifier).await {
            Ok(item) => Ok(item),
            Err(StoreError::DuplicateIdentifier(_)) => {
                debug!("Lost create race, reading existing record");
                self.find_by_identifier(identifier)
                    .await?
                    .ok_or_else(|| StoreError::Database(sqlx::Error::RowNotFound))
            }
            Err(e) => Err(e),
        }
    }

    /// All sarees, newest first
    pub async fn list_all(&self) -> Result<Vec<Item>> {
        let items = sqlx::query_as::<_, Item>(
            r#"
            SELECT id, saree_id, created_at
            FROM sarees
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Sarees whose identifier contains `substring`, newest first.
    ///
    /// Matching is case-insensitive (ASCII, as SQLite's `LIKE`); wildcard
    /// characters in `substring` match literally.
    #[instrument(skip(self))]
    pub async fn list_matching(&self, substring: &str) -> Result<Vec<Item>> {
        let pattern = format!("%{}%", escape_like(substring));

        let items = sqlx::query_as::<_, Item>(
            r#"
            SELECT id, saree_id, created_at
            FROM sarees
            WHERE saree_id LIKE ?1 ESCAPE '\'
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Number of stored sarees
    pub async fn count(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sarees")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }

    /// Round-trip to the database (for readiness checks)
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Escape `LIKE` wildcards so the input matches literally
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
