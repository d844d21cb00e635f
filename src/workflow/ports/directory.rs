//! Repository identity lookup.

use super::WorkflowStoreResult;
use crate::workflow::domain::{Repository, RepositoryName};
use async_trait::async_trait;

/// Resolves sanitised repository names to their store identity.
#[async_trait]
pub trait RepositoryDirectory: Send + Sync {
    /// Returns the repository registered under `name`, or `None`.
    async fn resolve(&self, name: &RepositoryName) -> WorkflowStoreResult<Option<Repository>>;
}
