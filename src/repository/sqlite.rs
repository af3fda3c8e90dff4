//! SQLite-backed document repository.
//!
//! Provides durable storage with:
//! - Connection pool management
//! - WAL mode for concurrent reads
//! - Automatic migration execution

use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::{debug, instrument};

use super::{ConfigDocument, ConfigRepository, RepositoryError};

/// Kept low for SQLite since it uses file-level locking.
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Connections wait this long before returning `SQLITE_BUSY`.
const BUSY_TIMEOUT_MS: u32 = 5000;

/// Repository persisting documents as JSON text in a SQLite table.
#[derive(Debug, Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Opens (creating if needed) the database at `db_path` and migrates it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the connection fails,
    /// or `RepositoryError::Migration` if migrations fail.
    #[instrument(skip(db_path), fields(path = %db_path.display()))]
    pub async fn new(db_path: &Path) -> Result<Self, RepositoryError> {
        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(DEFAULT_MAX_CONNECTIONS)
            .connect(&db_url)
            .await?;

        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&pool)
            .await?;

        sqlx::query(&format!("PRAGMA busy_timeout={BUSY_TIMEOUT_MS}"))
            .execute(&pool)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Creates an in-memory database. Contents vanish with the pool.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the connection fails,
    /// or `RepositoryError::Migration` if migrations fail.
    #[instrument]
    pub async fn new_in_memory() -> Result<Self, RepositoryError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Closes the pool, waiting for in-flight queries.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl ConfigRepository for SqliteRepository {
    async fn get(&self, identifier: &str) -> Result<Option<ConfigDocument>, RepositoryError> {
        let raw: Option<String> =
            sqlx::query_scalar("SELECT value FROM config_documents WHERE identifier = ?")
                .bind(identifier)
                .fetch_optional(&self.pool)
                .await?;

        let Some(raw) = raw else {
            return Ok(None);
        };
        let value = serde_json::from_str(&raw).map_err(|source| RepositoryError::Json {
            identifier: identifier.to_string(),
            source,
        })?;
        Ok(Some(ConfigDocument::new(identifier, value)))
    }

    async fn save(&self, document: ConfigDocument) -> Result<(), RepositoryError> {
        let raw = serde_json::to_string(&document.value).map_err(|source| {
            RepositoryError::Json {
                identifier: document.identifier.clone(),
                source,
            }
        })?;

        sqlx::query(
            "INSERT INTO config_documents (identifier, value, updated_at) \
             VALUES (?, ?, CURRENT_TIMESTAMP) \
             ON CONFLICT(identifier) DO UPDATE SET \
             value = excluded.value, updated_at = CURRENT_TIMESTAMP",
        )
        .bind(&document.identifier)
        .bind(raw)
        .execute(&self.pool)
        .await?;

        debug!(identifier = %document.identifier, "saved config document");
        Ok(())
    }

    async fn delete(&self, identifier: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM config_documents WHERE identifier = ?")
            .bind(identifier)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn identifiers_with_prefix(&self, prefix: &str) -> Result<Vec<String>, RepositoryError> {
        let identifiers: Vec<String> = sqlx::query_scalar(
            "SELECT identifier FROM config_documents \
             WHERE substr(identifier, 1, length(?)) = ? ORDER BY identifier",
        )
        .bind(prefix)
        .bind(prefix)
        .fetch_all(&self.pool)
        .await?;
        Ok(identifiers)
    }
}
