//! Directed "depends-on" relation between issues of one repository.

use crate::workflow::{
    domain::{DependencyEdge, Issue, IssueId, RepoId, WorkflowDomainError},
    ports::{DependencyStore, IssueStore, WorkflowStoreError},
};
use mockable::Clock;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Errors returned by dependency graph operations.
#[derive(Debug, Clone, Error)]
pub enum DependencyGraphError {
    /// The edge is malformed, for example a self dependency.
    #[error(transparent)]
    Domain(#[from] WorkflowDomainError),

    /// Store operation failed, passed through unchanged.
    #[error(transparent)]
    Store(#[from] WorkflowStoreError),
}

/// Result type for dependency graph operations.
pub type DependencyGraphResult<T> = Result<T, DependencyGraphError>;

/// Maintains dependency edges. Cycles spanning several edges are accepted.
pub struct DependencyGraph<S, C>
where
    S: IssueStore + DependencyStore,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    clock: Arc<C>,
}

impl<S, C> DependencyGraph<S, C>
where
    S: IssueStore + DependencyStore,
    C: Clock + Send + Sync,
{
    /// Creates a dependency graph over `store`.
    #[must_use]
    pub const fn new(store: Arc<S>, clock: Arc<C>) -> Self {
        Self { store, clock }
    }

    /// Records that `issue_id` depends on `depends_on_id`.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowStoreError::IssueNotFound`] when either issue is
    /// missing from the repository,
    /// [`WorkflowDomainError::SelfDependency`] when both ids are equal, and
    /// [`WorkflowStoreError::DuplicateDependency`] when the edge exists.
    pub async fn add_dependency(
        &self,
        repo_id: RepoId,
        issue_id: IssueId,
        depends_on_id: IssueId,
    ) -> DependencyGraphResult<()> {
        if issue_id == depends_on_id {
            self.store.get_issue(repo_id, issue_id).await?;
        }
        let edge = DependencyEdge::new(issue_id, depends_on_id, &*self.clock)?;
        self.store.insert_dependency(repo_id, &edge).await?;
        info!(
            repo_id = %repo_id,
            issue_id = %issue_id,
            depends_on_id = %depends_on_id,
            "dependency added"
        );
        Ok(())
    }

    /// Removes the edge if present and reports whether one was removed.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowStoreError::IssueNotFound`] when `issue_id` is
    /// missing from the repository.
    pub async fn remove_dependency(
        &self,
        repo_id: RepoId,
        issue_id: IssueId,
        depends_on_id: IssueId,
    ) -> DependencyGraphResult<bool> {
        let removed = self
            .store
            .delete_dependency(repo_id, issue_id, depends_on_id)
            .await?;
        if removed {
            info!(
                repo_id = %repo_id,
                issue_id = %issue_id,
                depends_on_id = %depends_on_id,
                "dependency removed"
            );
        }
        Ok(removed)
    }

    /// Returns the issues `issue_id` depends on, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowStoreError::IssueNotFound`] when `issue_id` is
    /// missing from the repository.
    pub async fn dependencies(
        &self,
        repo_id: RepoId,
        issue_id: IssueId,
    ) -> DependencyGraphResult<Vec<Issue>> {
        Ok(self.store.dependencies_of(repo_id, issue_id).await?)
    }

    /// Returns the issues blocked on `issue_id`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowStoreError::IssueNotFound`] when `issue_id` is
    /// missing from the repository.
    pub async fn dependents(
        &self,
        repo_id: RepoId,
        issue_id: IssueId,
    ) -> DependencyGraphResult<Vec<Issue>> {
        Ok(self.store.dependents_of(repo_id, issue_id).await?)
    }

    /// Reports whether `issue_id` depends on `depends_on_id`.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowStoreError::IssueNotFound`] when `issue_id` is
    /// missing from the repository.
    pub async fn has_dependency(
        &self,
        repo_id: RepoId,
        issue_id: IssueId,
        depends_on_id: IssueId,
    ) -> DependencyGraphResult<bool> {
        Ok(self
            .store
            .has_dependency(repo_id, issue_id, depends_on_id)
            .await?)
    }
}
