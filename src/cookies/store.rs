//! Lazily loaded, explicitly persisted cookie jar.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, instrument, warn};

use super::PersistentCookieJar;
use crate::config::FetchConfig;
use crate::http::{FetchError, TransportClient};
use crate::repository::{ConfigDocument, ConfigRepository, RepositoryError};

/// Repository identifier of the serialized cookie jar.
pub const COOKIE_JAR_IDENTIFIER: &str = "CONFIGREPOSITORY_COOKIEJAR";

/// Errors raised when writing the cookie jar.
#[derive(Debug, Error)]
pub enum CookieStoreError {
    /// The repository rejected the write or delete.
    #[error("failed to write cookie jar: {0}")]
    Repository(#[from] RepositoryError),
}

/// Owns the process-wide cookie jar and the transport bound to it.
///
/// The jar is loaded from the repository on first use and written back only
/// when [`CookieJarStore::persist`] is called.
pub struct CookieJarStore {
    repository: Arc<dyn ConfigRepository>,
    config: FetchConfig,
    jar: OnceCell<Arc<PersistentCookieJar>>,
    transport: OnceCell<Arc<TransportClient>>,
    write_lock: Mutex<()>,
}

impl CookieJarStore {
    /// Creates a store; nothing is read until first use.
    #[must_use]
    pub fn new(repository: Arc<dyn ConfigRepository>, config: FetchConfig) -> Self {
        Self {
            repository,
            config,
            jar: OnceCell::new(),
            transport: OnceCell::new(),
            write_lock: Mutex::new(()),
        }
    }

    /// Reads the persisted jar, falling back to an empty one.
    ///
    /// Never fails: unreadable or malformed blobs are logged and ignored.
    #[instrument(level = "debug", skip(self))]
    pub async fn load(&self) -> PersistentCookieJar {
        let document = match self.repository.get(COOKIE_JAR_IDENTIFIER).await {
            Ok(Some(document)) => document,
            Ok(None) => {
                debug!("no persisted cookie jar");
                return PersistentCookieJar::new();
            }
            Err(error) => {
                warn!(error = %error, "failed to read cookie jar; starting empty");
                return PersistentCookieJar::new();
            }
        };

        let Some(blob) = document.value.as_str() else {
            warn!("persisted cookie jar is not a string; starting empty");
            return PersistentCookieJar::new();
        };

        match PersistentCookieJar::deserialize(blob) {
            Ok(jar) => {
                debug!(cookies = jar.len(), "restored cookie jar");
                jar
            }
            Err(error) => {
                warn!(error = %error, "failed to parse cookie jar; starting empty");
                PersistentCookieJar::new()
            }
        }
    }

    /// The jar, loading it on first call. Concurrent callers share one load.
    pub async fn jar(&self) -> Arc<PersistentCookieJar> {
        Arc::clone(
            self.jar
                .get_or_init(|| async { Arc::new(self.load().await) })
                .await,
        )
    }

    /// The transport bound to the jar, created on first call and reused after.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::ClientBuild`] when the HTTP client cannot be built;
    /// the next call retries.
    pub async fn get_or_create(&self) -> Result<Arc<TransportClient>, FetchError> {
        let transport = self
            .transport
            .get_or_try_init(|| async {
                let jar = self.jar().await;
                TransportClient::new(jar, &self.config).map(Arc::new)
            })
            .await?;
        Ok(Arc::clone(transport))
    }

    /// Writes the jar back to the repository.
    ///
    /// Returns `Ok(false)` without writing when the jar was never created.
    ///
    /// # Errors
    ///
    /// Returns [`CookieStoreError::Repository`] when the write fails.
    #[instrument(level = "debug", skip(self))]
    pub async fn persist(&self) -> Result<bool, CookieStoreError> {
        let Some(jar) = self.jar.get() else {
            debug!("cookie jar never created; nothing to persist");
            return Ok(false);
        };

        let _guard = self.write_lock.lock().await;
        let blob = jar.serialize();
        self.repository
            .save(ConfigDocument::new(COOKIE_JAR_IDENTIFIER, Value::String(blob)))
            .await?;
        info!(cookies = jar.len(), "persisted cookie jar");
        Ok(true)
    }

    /// Empties the in-memory jar (if created) and deletes the persisted blob.
    ///
    /// # Errors
    ///
    /// Returns [`CookieStoreError::Repository`] when the delete fails.
    pub async fn clear(&self) -> Result<(), CookieStoreError> {
        let _guard = self.write_lock.lock().await;
        if let Some(jar) = self.jar.get() {
            jar.clear();
        }
        self.repository.delete(COOKIE_JAR_IDENTIFIER).await?;
        info!("cleared cookie jar");
        Ok(())
    }
}
