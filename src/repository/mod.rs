//! Key-value persistence seam for the cookie jar blob and token records.
//!
//! Higher layers depend only on [`ConfigRepository`] so the backing store can
//! be swapped (SQLite file for the CLI, in-memory map for tests).

mod memory;
mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::MemoryRepository;
pub use sqlite::SqliteRepository;

/// A stored value and the identifier it lives under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigDocument {
    /// Unique key of the record.
    pub identifier: String,
    /// Arbitrary JSON payload.
    pub value: serde_json::Value,
}

impl ConfigDocument {
    /// Creates a document.
    #[must_use]
    pub fn new(identifier: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            identifier: identifier.into(),
            value,
        }
    }
}

/// Repository-level errors.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Query or connection failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Failed to run migrations.
    #[error("failed to run migrations: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored value is not valid JSON.
    #[error("stored document {identifier} is not valid JSON: {source}")]
    Json {
        /// Identifier of the unreadable record.
        identifier: String,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
}

/// Data-access contract for configuration documents.
#[async_trait]
pub trait ConfigRepository: Send + Sync {
    /// Reads the document stored under `identifier`.
    async fn get(&self, identifier: &str) -> Result<Option<ConfigDocument>, RepositoryError>;

    /// Inserts or replaces a document.
    async fn save(&self, document: ConfigDocument) -> Result<(), RepositoryError>;

    /// Removes a document. Returns `true` when one existed.
    async fn delete(&self, identifier: &str) -> Result<bool, RepositoryError>;

    /// Lists identifiers starting with `prefix`, sorted.
    async fn identifiers_with_prefix(&self, prefix: &str) -> Result<Vec<String>, RepositoryError>;
}
