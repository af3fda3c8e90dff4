//! Per-host token records in the key-value repository.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::AuthToken;
use crate::repository::{ConfigDocument, ConfigRepository, RepositoryError};

/// Prefix of every token record identifier.
pub const AUTH_TOKEN_PREFIX: &str = "CONFIGREPOSITORY_OPDS_AUTHENTICATION_TOKEN";

/// Repository identifier for `hostname`: prefix plus base64 of the hostname.
#[must_use]
pub fn token_identifier(hostname: &str) -> String {
    format!("{AUTH_TOKEN_PREFIX}.{}", STANDARD.encode(hostname))
}

/// Errors raised when writing token records.
#[derive(Debug, Error)]
pub enum AuthStoreError {
    /// The token has no parseable `authenticationUrl` to key it by.
    #[error("token has no valid authentication URL: {url:?}")]
    InvalidAuthenticationUrl {
        /// The offending value.
        url: Option<String>,
    },

    /// The token could not be encoded.
    #[error("failed to encode token: {0}")]
    Encode(#[from] serde_json::Error),

    /// The repository rejected the write.
    #[error("failed to write token: {0}")]
    Repository(#[from] RepositoryError),
}

/// Reads and writes [`AuthToken`] records keyed by hostname.
pub struct AuthTokenStore {
    repository: Arc<dyn ConfigRepository>,
    write_lock: Mutex<()>,
}

impl AuthTokenStore {
    /// Creates a store over `repository`.
    #[must_use]
    pub fn new(repository: Arc<dyn ConfigRepository>) -> Self {
        Self {
            repository,
            write_lock: Mutex::new(()),
        }
    }

    /// Stores `token` under the hostname of its authentication URL.
    ///
    /// # Errors
    ///
    /// Returns [`AuthStoreError`] when the token cannot be keyed, encoded or written.
    #[instrument(level = "debug", skip(self, token))]
    pub async fn save(&self, token: &AuthToken) -> Result<(), AuthStoreError> {
        let hostname = token
            .hostname()
            .ok_or_else(|| AuthStoreError::InvalidAuthenticationUrl {
                url: token.authentication_url.clone(),
            })?;
        let value = serde_json::to_value(token)?;

        let _guard = self.write_lock.lock().await;
        self.repository
            .save(ConfigDocument::new(token_identifier(&hostname), value))
            .await?;
        info!(hostname = %hostname, "saved authentication token");
        Ok(())
    }

    /// Token stored for `hostname`, or `None` when absent or unreadable.
    #[instrument(level = "debug", skip(self))]
    pub async fn get(&self, hostname: &str) -> Option<AuthToken> {
        let document = match self.repository.get(&token_identifier(hostname)).await {
            Ok(Some(document)) => document,
            Ok(None) => return None,
            Err(error) => {
                warn!(error = %error, "failed to read authentication token");
                return None;
            }
        };

        match serde_json::from_value(document.value) {
            Ok(token) => Some(token),
            Err(error) => {
                warn!(error = %error, "stored authentication token is malformed");
                None
            }
        }
    }

    /// Deletes the token for `hostname`. Returns `true` when one existed.
    ///
    /// # Errors
    ///
    /// Returns [`AuthStoreError::Repository`] when the delete fails.
    pub async fn remove(&self, hostname: &str) -> Result<bool, AuthStoreError> {
        let _guard = self.write_lock.lock().await;
        Ok(self.repository.delete(&token_identifier(hostname)).await?)
    }

    /// Deletes every stored token and returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`AuthStoreError::Repository`] when listing or deleting fails.
    pub async fn clear(&self) -> Result<usize, AuthStoreError> {
        let _guard = self.write_lock.lock().await;
        let prefix = format!("{AUTH_TOKEN_PREFIX}.");
        let mut removed = 0;
        for identifier in self.repository.identifiers_with_prefix(&prefix).await? {
            if self.repository.delete(&identifier).await? {
                removed += 1;
            }
        }
        debug!(removed, "cleared authentication tokens");
        Ok(removed)
    }
}
