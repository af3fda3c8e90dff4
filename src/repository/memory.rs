use async_trait::async_trait;
use dashmap::DashMap;

use super::{ConfigDocument, ConfigRepository, RepositoryError};

/// Process-local repository backed by a concurrent map.
///
/// Nothing survives the process; share one instance behind an `Arc` to
/// simulate a restart with a fresh client.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    documents: DashMap<String, serde_json::Value>,
}

impl MemoryRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Returns `true` when nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[async_trait]
impl ConfigRepository for MemoryRepository {
    async fn get(&self, identifier: &str) -> Result<Option<ConfigDocument>, RepositoryError> {
        Ok(self
            .documents
            .get(identifier)
            .map(|entry| ConfigDocument::new(identifier, entry.value().clone())))
    }

    async fn save(&self, document: ConfigDocument) -> Result<(), RepositoryError> {
        self.documents.insert(document.identifier, document.value);
        Ok(())
    }

    async fn delete(&self, identifier: &str) -> Result<bool, RepositoryError> {
        Ok(self.documents.remove(identifier).is_some())
    }

    async fn identifiers_with_prefix(&self, prefix: &str) -> Result<Vec<String>, RepositoryError> {
        let mut identifiers: Vec<String> = self
            .documents
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect();
        identifiers.sort();
        Ok(identifiers)
    }
}
