//! Entity store ports: repository-scoped persistence for issues, merge
//! requests and dependency edges.

use crate::workflow::domain::{
    DependencyEdge, Description, Issue, IssueId, IssueState, IssueTransition, MergeRequest,
    MergeRequestId, MergeRequestState, MergeRequestTransition, NewIssue, NewMergeRequest, RepoId,
    Title,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Result type for entity store operations.
pub type WorkflowStoreResult<T> = Result<T, WorkflowStoreError>;

/// Issue persistence contract.
///
/// Every lookup is scoped by repository: an issue id from another
/// repository is indistinguishable from a missing one.
#[async_trait]
pub trait IssueStore: Send + Sync {
    /// Returns the issue with `issue_id` in `repo_id`.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowStoreError::IssueNotFound`] when no issue matches
    /// both identifiers.
    async fn get_issue(&self, repo_id: RepoId, issue_id: IssueId) -> WorkflowStoreResult<Issue>;

    /// Returns all issues of the repository, newest first by creation time.
    async fn list_issues(&self, repo_id: RepoId) -> WorkflowStoreResult<Vec<Issue>>;

    /// Returns the repository's issues in `state`, newest first by creation
    /// time.
    async fn list_issues_by_state(
        &self,
        repo_id: RepoId,
        state: IssueState,
    ) -> WorkflowStoreResult<Vec<Issue>>;

    /// Inserts a new open issue and returns its generated identifier.
    async fn create_issue(&self, issue: &NewIssue) -> WorkflowStoreResult<IssueId>;

    /// Rewrites title and description and bumps `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowStoreError::IssueNotFound`] when no row matched.
    async fn update_issue(
        &self,
        repo_id: RepoId,
        issue_id: IssueId,
        title: &Title,
        description: &Description,
        updated_at: DateTime<Utc>,
    ) -> WorkflowStoreResult<()>;

    /// Deletes the issue together with every dependency edge touching it.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowStoreError::IssueNotFound`] when no row matched.
    async fn delete_issue(&self, repo_id: RepoId, issue_id: IssueId) -> WorkflowStoreResult<()>;

    /// Applies `transition` only if the issue is currently in the
    /// transition's required state, as one conditional update.
    ///
    /// Returns the number of rows matched: `1` when the transition applied,
    /// `0` when the issue is missing or its state did not match.
    async fn transition_issue(
        &self,
        repo_id: RepoId,
        issue_id: IssueId,
        transition: IssueTransition,
        at: DateTime<Utc>,
    ) -> WorkflowStoreResult<usize>;
}

/// Merge request persistence contract.
#[async_trait]
pub trait MergeRequestStore: Send + Sync {
    /// Returns the merge request with `merge_request_id` in `repo_id`.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowStoreError::MergeRequestNotFound`] when no merge
    /// request matches both identifiers.
    async fn get_merge_request(
        &self,
        repo_id: RepoId,
        merge_request_id: MergeRequestId,
    ) -> WorkflowStoreResult<MergeRequest>;

    /// Returns all merge requests of the repository, newest first by
    /// creation time.
    async fn list_merge_requests(&self, repo_id: RepoId) -> WorkflowStoreResult<Vec<MergeRequest>>;

    /// Returns the repository's merge requests in `state`, newest first by
    /// creation time.
    async fn list_merge_requests_by_state(
        &self,
        repo_id: RepoId,
        state: MergeRequestState,
    ) -> WorkflowStoreResult<Vec<MergeRequest>>;

    /// Inserts a new open merge request and returns its generated
    /// identifier.
    async fn create_merge_request(
        &self,
        merge_request: &NewMergeRequest,
    ) -> WorkflowStoreResult<MergeRequestId>;

    /// Rewrites title and description and bumps `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowStoreError::MergeRequestNotFound`] when no row
    /// matched.
    async fn update_merge_request(
        &self,
        repo_id: RepoId,
        merge_request_id: MergeRequestId,
        title: &Title,
        description: &Description,
        updated_at: DateTime<Utc>,
    ) -> WorkflowStoreResult<()>;

    /// Deletes the merge request.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowStoreError::MergeRequestNotFound`] when no row
    /// matched.
    async fn delete_merge_request(
        &self,
        repo_id: RepoId,
        merge_request_id: MergeRequestId,
    ) -> WorkflowStoreResult<()>;

    /// Applies `transition` only if the merge request is currently in the
    /// transition's required state, returning the number of rows matched.
    async fn transition_merge_request(
        &self,
        repo_id: RepoId,
        merge_request_id: MergeRequestId,
        transition: MergeRequestTransition,
        at: DateTime<Utc>,
    ) -> WorkflowStoreResult<usize>;
}

/// Dependency edge persistence contract.
#[async_trait]
pub trait DependencyStore: Send + Sync {
    /// Inserts an edge after checking both endpoints exist in `repo_id`.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowStoreError::IssueNotFound`] for a missing endpoint
    /// or [`WorkflowStoreError::DuplicateDependency`] when the ordered pair
    /// already has an edge.
    async fn insert_dependency(
        &self,
        repo_id: RepoId,
        edge: &DependencyEdge,
    ) -> WorkflowStoreResult<()>;

    /// Deletes the edge if present and reports whether one was removed.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowStoreError::IssueNotFound`] when `issue_id` does not
    /// exist in `repo_id`.
    async fn delete_dependency(
        &self,
        repo_id: RepoId,
        issue_id: IssueId,
        depends_on_id: IssueId,
    ) -> WorkflowStoreResult<bool>;

    /// Returns the issues `issue_id` depends on, newest first by creation
    /// time.
    async fn dependencies_of(
        &self,
        repo_id: RepoId,
        issue_id: IssueId,
    ) -> WorkflowStoreResult<Vec<Issue>>;

    /// Returns the issues depending on `issue_id`, newest first by creation
    /// time.
    async fn dependents_of(
        &self,
        repo_id: RepoId,
        issue_id: IssueId,
    ) -> WorkflowStoreResult<Vec<Issue>>;

    /// Reports whether `issue_id` depends on `depends_on_id`.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowStoreError::IssueNotFound`] when `issue_id` does not
    /// exist in `repo_id`.
    async fn has_dependency(
        &self,
        repo_id: RepoId,
        issue_id: IssueId,
        depends_on_id: IssueId,
    ) -> WorkflowStoreResult<bool>;
}

/// A backend storing all three entity kinds, so that deleting an issue can
/// cascade to its dependency edges.
pub trait WorkflowStore: IssueStore + MergeRequestStore + DependencyStore {}

impl<T> WorkflowStore for T where T: IssueStore + MergeRequestStore + DependencyStore {}

/// Errors returned by entity store implementations.
#[derive(Debug, Clone, Error)]
pub enum WorkflowStoreError {
    /// No issue matches the repository and issue identifiers.
    #[error("issue {issue_id} not found in repository {repo_id}")]
    IssueNotFound {
        /// Repository searched.
        repo_id: RepoId,
        /// Issue looked up.
        issue_id: IssueId,
    },

    /// No merge request matches the repository and merge request
    /// identifiers.
    #[error("merge request {merge_request_id} not found in repository {repo_id}")]
    MergeRequestNotFound {
        /// Repository searched.
        repo_id: RepoId,
        /// Merge request looked up.
        merge_request_id: MergeRequestId,
    },

    /// The ordered pair already has a dependency edge.
    #[error("issue {issue_id} already depends on issue {depends_on_id}")]
    DuplicateDependency {
        /// Blocked issue.
        issue_id: IssueId,
        /// Issue depended on.
        depends_on_id: IssueId,
    },

    /// Persisted data could not be reconstructed into domain types.
    #[error("invalid persisted workflow data: {0}")]
    InvalidPersistedData(Arc<dyn std::error::Error + Send + Sync>),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl WorkflowStoreError {
    /// Wraps persisted-data decoding or validation failures.
    pub fn invalid_persisted_data(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::InvalidPersistedData(Arc::new(err))
    }

    /// Wraps a persistence-layer failure.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }

    /// Shorthand for [`Self::IssueNotFound`].
    #[must_use]
    pub const fn issue_not_found(repo_id: RepoId, issue_id: IssueId) -> Self {
        Self::IssueNotFound { repo_id, issue_id }
    }

    /// Shorthand for [`Self::MergeRequestNotFound`].
    #[must_use]
    pub const fn merge_request_not_found(
        repo_id: RepoId,
        merge_request_id: MergeRequestId,
    ) -> Self {
        Self::MergeRequestNotFound {
            repo_id,
            merge_request_id,
        }
    }
}
