//! In-memory repository directory, seeded from configuration or by tests.

use crate::workflow::{
    domain::{Repository, RepositoryName},
    ports::{RepositoryDirectory, WorkflowStoreError, WorkflowStoreResult},
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Thread-safe map from repository name to repository identity.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepositoryDirectory {
    repositories: Arc<RwLock<HashMap<RepositoryName, Repository>>>,
}

impl InMemoryRepositoryDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a directory holding `repositories`, for example those of
    /// [`crate::config::WorkflowConfig::repositories`].
    #[must_use]
    pub fn from_repositories(repositories: impl IntoIterator<Item = Repository>) -> Self {
        let entries = repositories
            .into_iter()
            .map(|repository| (repository.name().clone(), repository))
            .collect();
        Self {
            repositories: Arc::new(RwLock::new(entries)),
        }
    }

    /// Registers `repository` under its name, replacing any previous entry.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowStoreError::Persistence`] when lock acquisition
    /// fails.
    pub fn register(&self, repository: Repository) -> WorkflowStoreResult<()> {
        let mut repositories = self.repositories.write().map_err(|err| {
            WorkflowStoreError::persistence(std::io::Error::other(err.to_string()))
        })?;
        repositories.insert(repository.name().clone(), repository);
        Ok(())
    }
}

#[async_trait]
impl RepositoryDirectory for InMemoryRepositoryDirectory {
    async fn resolve(&self, name: &RepositoryName) -> WorkflowStoreResult<Option<Repository>> {
        let repositories = self.repositories.read().map_err(|err| {
            WorkflowStoreError::persistence(std::io::Error::other(err.to_string()))
        })?;
        Ok(repositories.get(name).cloned())
    }
}
