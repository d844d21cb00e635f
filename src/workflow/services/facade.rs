//! External entry points of the workflow engine.
//!
//! The facade resolves repository names and validates caller input, then
//! delegates to the state machine, dependency graph and merge executor.
//! Every failure leaves as a [`WorkflowError`].

use super::{
    dependency_graph::{DependencyGraph, DependencyGraphError},
    merge_executor::{MergeError, MergeExecutor, WorkingTreeLocks},
    state_machine::{StateMachine, TransitionError},
};
use crate::workflow::{
    domain::{
        Actor, BranchName, Description, Issue, IssueId, IssueState, MergeRequest,
        MergeRequestContent, MergeRequestId, MergeRequestState, NewIssue, NewMergeRequest,
        Repository, RepositoryName, Title, WorkflowDomainError,
    },
    ports::{RepositoryDirectory, VcsError, VersionControl, WorkflowStore, WorkflowStoreError},
};
use mockable::Clock;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Caller-facing error taxonomy.
#[derive(Debug, Clone, Error)]
pub enum WorkflowError {
    /// A repository, issue, merge request or dependency endpoint is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// A guarded transition's required state did not hold.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The dependency edge already exists.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Caller input was rejected.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Version-control checkout or merge failed.
    #[error("external operation failed: {0}")]
    ExternalOperationFailure(String),

    /// The merge commit exists but the merge request was not marked merged.
    #[error("merge not recorded: {0}")]
    Unrecorded(String),

    /// The backing store failed.
    #[error("storage failure: {0}")]
    Storage(#[source] WorkflowStoreError),
}

/// Result type for facade operations.
pub type WorkflowResult<T> = Result<T, WorkflowError>;

impl From<WorkflowDomainError> for WorkflowError {
    fn from(err: WorkflowDomainError) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}

impl From<WorkflowStoreError> for WorkflowError {
    fn from(err: WorkflowStoreError) -> Self {
        match err {
            WorkflowStoreError::IssueNotFound { .. }
            | WorkflowStoreError::MergeRequestNotFound { .. } => Self::NotFound(err.to_string()),
            WorkflowStoreError::DuplicateDependency { .. } => Self::Conflict(err.to_string()),
            WorkflowStoreError::InvalidPersistedData(_) | WorkflowStoreError::Persistence(_) => {
                Self::Storage(err)
            }
        }
    }
}

impl From<TransitionError> for WorkflowError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::InvalidState { .. } => Self::InvalidState(err.to_string()),
            TransitionError::Unreadable { source, .. } | TransitionError::Store(source) => {
                Self::from(source)
            }
        }
    }
}

impl From<DependencyGraphError> for WorkflowError {
    fn from(err: DependencyGraphError) -> Self {
        match err {
            DependencyGraphError::Domain(domain_err) => Self::from(domain_err),
            DependencyGraphError::Store(store_err) => Self::from(store_err),
        }
    }
}

impl From<MergeError> for WorkflowError {
    fn from(err: MergeError) -> Self {
        match err {
            MergeError::NotOpen { .. } => Self::InvalidState(err.to_string()),
            MergeError::Vcs { .. } | MergeError::Timeout { .. } => {
                Self::ExternalOperationFailure(err.to_string())
            }
            MergeError::Unrecorded { .. } => Self::Unrecorded(err.to_string()),
            MergeError::Store(store_err) => Self::from(store_err),
        }
    }
}

impl From<VcsError> for WorkflowError {
    fn from(err: VcsError) -> Self {
        Self::ExternalOperationFailure(err.to_string())
    }
}

/// Caller input for creating an issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueDraft {
    title: String,
    description: String,
}

impl IssueDraft {
    /// Creates a draft with a title and an empty description.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Caller input for creating a merge request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeRequestDraft {
    title: String,
    description: String,
    source_branch: String,
    target_branch: String,
}

impl MergeRequestDraft {
    /// Creates a draft merging `source_branch` into `target_branch`.
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        source_branch: impl Into<String>,
        target_branch: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            source_branch: source_branch.into(),
            target_branch: target_branch.into(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Workflow engine entry points.
///
/// Callers pass a repository name, which is sanitised and resolved through
/// the [`RepositoryDirectory`], and the already-authenticated [`Actor`]
/// where an operation records who performed it.
pub struct WorkflowFacade<S, D, V, C>
where
    S: WorkflowStore,
    D: RepositoryDirectory,
    V: VersionControl,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    directory: Arc<D>,
    version_control: Arc<V>,
    clock: Arc<C>,
    state_machine: StateMachine<S, C>,
    dependency_graph: DependencyGraph<S, C>,
    merge_executor: MergeExecutor<S, V, C>,
}

impl<S, D, V, C> WorkflowFacade<S, D, V, C>
where
    S: WorkflowStore,
    D: RepositoryDirectory,
    V: VersionControl,
    C: Clock + Send + Sync,
{
    /// Wires the facade and its services over shared collaborators.
    #[must_use]
    pub fn new(store: Arc<S>, directory: Arc<D>, version_control: Arc<V>, clock: Arc<C>) -> Self {
        Self {
            state_machine: StateMachine::new(Arc::clone(&store), Arc::clone(&clock)),
            dependency_graph: DependencyGraph::new(Arc::clone(&store), Arc::clone(&clock)),
            merge_executor: MergeExecutor::new(
                Arc::clone(&store),
                Arc::clone(&version_control),
                Arc::clone(&clock),
            ),
            store,
            directory,
            version_control,
            clock,
        }
    }

    /// Bounds the version-control step of merges by `timeout`.
    #[must_use]
    pub fn with_merge_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.merge_executor = self.merge_executor.with_timeout(timeout);
        self
    }

    /// Shares `locks` with other facades or executors merging in the same
    /// working trees, so their merges are serialised per repository.
    #[must_use]
    pub fn with_working_tree_locks(mut self, locks: Arc<WorkingTreeLocks>) -> Self {
        self.merge_executor = self.merge_executor.with_locks(locks);
        self
    }

    async fn resolve(&self, repository: &str) -> WorkflowResult<Repository> {
        let name = RepositoryName::new(repository)?;
        self.directory
            .resolve(&name)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("repository '{name}'")))
    }

    // Issues

    /// Creates an open issue authored by `actor` and returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::InvalidArgument`] for an empty or overlong
    /// title and [`WorkflowError::NotFound`] for an unknown repository.
    pub async fn create_issue(
        &self,
        repository: &str,
        actor: &Actor,
        draft: IssueDraft,
    ) -> WorkflowResult<IssueId> {
        debug!(repository, actor = actor.username(), "create issue");
        let repo = self.resolve(repository).await?;
        let title = Title::new(draft.title)?;
        let new_issue = NewIssue::new(
            repo.id(),
            actor.id(),
            title,
            Description::new(draft.description),
            &*self.clock,
        );
        Ok(self.store.create_issue(&new_issue).await?)
    }

    /// Returns an issue.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::NotFound`] when the repository or issue is
    /// unknown.
    pub async fn get_issue(&self, repository: &str, issue_id: IssueId) -> WorkflowResult<Issue> {
        debug!(repository, issue_id = %issue_id, "get issue");
        let repo = self.resolve(repository).await?;
        Ok(self.store.get_issue(repo.id(), issue_id).await?)
    }

    /// Lists the repository's issues, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::NotFound`] for an unknown repository.
    pub async fn list_all_issues(&self, repository: &str) -> WorkflowResult<Vec<Issue>> {
        self.list_issues(repository, None).await
    }

    /// Lists the repository's issues in `state`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::NotFound`] for an unknown repository.
    pub async fn list_issues_by_state(
        &self,
        repository: &str,
        state: IssueState,
    ) -> WorkflowResult<Vec<Issue>> {
        self.list_issues(repository, Some(state)).await
    }

    /// Lists the repository's issues, optionally filtered by state.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::NotFound`] for an unknown repository.
    pub async fn list_issues(
        &self,
        repository: &str,
        state: Option<IssueState>,
    ) -> WorkflowResult<Vec<Issue>> {
        debug!(repository, state = ?state, "list issues");
        let repo = self.resolve(repository).await?;
        let issues = match state {
            Some(filter) => self.store.list_issues_by_state(repo.id(), filter).await?,
            None => self.store.list_issues(repo.id()).await?,
        };
        Ok(issues)
    }

    /// Rewrites an issue's title and description.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::InvalidArgument`] for an invalid title and
    /// [`WorkflowError::NotFound`] when the issue is unknown.
    pub async fn update_issue(
        &self,
        repository: &str,
        issue_id: IssueId,
        title: &str,
        description: &str,
    ) -> WorkflowResult<Issue> {
        debug!(repository, issue_id = %issue_id, "update issue");
        let repo = self.resolve(repository).await?;
        let new_title = Title::new(title)?;
        self.store
            .update_issue(
                repo.id(),
                issue_id,
                &new_title,
                &Description::new(description),
                self.clock.utc(),
            )
            .await?;
        Ok(self.store.get_issue(repo.id(), issue_id).await?)
    }

    /// Deletes an issue and every dependency edge touching it.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::NotFound`] when the issue is unknown.
    pub async fn delete_issue(&self, repository: &str, issue_id: IssueId) -> WorkflowResult<()> {
        debug!(repository, issue_id = %issue_id, "delete issue");
        let repo = self.resolve(repository).await?;
        Ok(self.store.delete_issue(repo.id(), issue_id).await?)
    }

    /// Closes an open issue.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::InvalidState`] when the issue is already
    /// closed and [`WorkflowError::NotFound`] when it is unknown.
    pub async fn close_issue(
        &self,
        repository: &str,
        issue_id: IssueId,
        actor: &Actor,
    ) -> WorkflowResult<Issue> {
        debug!(repository, issue_id = %issue_id, actor = actor.username(), "close issue");
        let repo = self.resolve(repository).await?;
        Ok(self
            .state_machine
            .close_issue(repo.id(), issue_id, actor.id())
            .await?)
    }

    /// Reopens a closed issue.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::InvalidState`] when the issue is already
    /// open and [`WorkflowError::NotFound`] when it is unknown.
    pub async fn reopen_issue(&self, repository: &str, issue_id: IssueId) -> WorkflowResult<Issue> {
        debug!(repository, issue_id = %issue_id, "reopen issue");
        let repo = self.resolve(repository).await?;
        Ok(self.state_machine.reopen_issue(repo.id(), issue_id).await?)
    }

    /// Records that `issue_id` depends on `depends_on_id`.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::NotFound`] for a missing endpoint,
    /// [`WorkflowError::InvalidArgument`] for a self dependency and
    /// [`WorkflowError::Conflict`] when the edge exists.
    pub async fn add_dependency(
        &self,
        repository: &str,
        issue_id: IssueId,
        depends_on_id: IssueId,
    ) -> WorkflowResult<()> {
        debug!(
            repository,
            issue_id = %issue_id,
            depends_on_id = %depends_on_id,
            "add dependency"
        );
        let repo = self.resolve(repository).await?;
        Ok(self
            .dependency_graph
            .add_dependency(repo.id(), issue_id, depends_on_id)
            .await?)
    }

    /// Removes a dependency edge; removing an absent edge succeeds.
    ///
    /// Returns whether an edge was removed.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::NotFound`] when `issue_id` is unknown.
    pub async fn remove_dependency(
        &self,
        repository: &str,
        issue_id: IssueId,
        depends_on_id: IssueId,
    ) -> WorkflowResult<bool> {
        debug!(
            repository,
            issue_id = %issue_id,
            depends_on_id = %depends_on_id,
            "remove dependency"
        );
        let repo = self.resolve(repository).await?;
        Ok(self
            .dependency_graph
            .remove_dependency(repo.id(), issue_id, depends_on_id)
            .await?)
    }

    /// Returns the issues `issue_id` depends on, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::NotFound`] when `issue_id` is unknown.
    pub async fn dependencies(
        &self,
        repository: &str,
        issue_id: IssueId,
    ) -> WorkflowResult<Vec<Issue>> {
        debug!(repository, issue_id = %issue_id, "list dependencies");
        let repo = self.resolve(repository).await?;
        Ok(self.dependency_graph.dependencies(repo.id(), issue_id).await?)
    }

    /// Returns the issues blocked on `issue_id`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::NotFound`] when `issue_id` is unknown.
    pub async fn dependents(
        &self,
        repository: &str,
        issue_id: IssueId,
    ) -> WorkflowResult<Vec<Issue>> {
        debug!(repository, issue_id = %issue_id, "list dependents");
        let repo = self.resolve(repository).await?;
        Ok(self.dependency_graph.dependents(repo.id(), issue_id).await?)
    }

    /// Reports whether `issue_id` depends on `depends_on_id`.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::NotFound`] when `issue_id` is unknown.
    pub async fn has_dependency(
        &self,
        repository: &str,
        issue_id: IssueId,
        depends_on_id: IssueId,
    ) -> WorkflowResult<bool> {
        debug!(
            repository,
            issue_id = %issue_id,
            depends_on_id = %depends_on_id,
            "has dependency"
        );
        let repo = self.resolve(repository).await?;
        Ok(self
            .dependency_graph
            .has_dependency(repo.id(), issue_id, depends_on_id)
            .await?)
    }

    // Merge requests

    /// Creates an open merge request authored by `actor` and returns its id.
    ///
    /// Both branches must exist in the repository at creation time.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::InvalidArgument`] for an invalid title,
    /// malformed, identical or missing branches, and
    /// [`WorkflowError::ExternalOperationFailure`] when branch lookup fails.
    pub async fn create_merge_request(
        &self,
        repository: &str,
        actor: &Actor,
        draft: MergeRequestDraft,
    ) -> WorkflowResult<MergeRequestId> {
        debug!(
            repository,
            actor = actor.username(),
            source = draft.source_branch.as_str(),
            target = draft.target_branch.as_str(),
            "create merge request"
        );
        let repo = self.resolve(repository).await?;
        let content = MergeRequestContent {
            title: Title::new(draft.title)?,
            description: Description::new(draft.description),
            source_branch: BranchName::new(draft.source_branch)?,
            target_branch: BranchName::new(draft.target_branch)?,
        };
        let new_request = NewMergeRequest::new(repo.id(), actor.id(), content, &*self.clock)?;

        for branch in [new_request.source_branch(), new_request.target_branch()] {
            if !self.version_control.branch_exists(&repo, branch).await? {
                return Err(WorkflowError::InvalidArgument(format!(
                    "branch '{branch}' does not exist in repository '{}'",
                    repo.name()
                )));
            }
        }

        Ok(self.store.create_merge_request(&new_request).await?)
    }

    /// Returns a merge request.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::NotFound`] when the repository or merge
    /// request is unknown.
    pub async fn get_merge_request(
        &self,
        repository: &str,
        merge_request_id: MergeRequestId,
    ) -> WorkflowResult<MergeRequest> {
        debug!(repository, merge_request_id = %merge_request_id, "get merge request");
        let repo = self.resolve(repository).await?;
        Ok(self
            .store
            .get_merge_request(repo.id(), merge_request_id)
            .await?)
    }

    /// Lists the repository's merge requests, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::NotFound`] for an unknown repository.
    pub async fn list_all_merge_requests(
        &self,
        repository: &str,
    ) -> WorkflowResult<Vec<MergeRequest>> {
        self.list_merge_requests(repository, None).await
    }

    /// Lists the repository's merge requests in `state`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::NotFound`] for an unknown repository.
    pub async fn list_merge_requests_by_state(
        &self,
        repository: &str,
        state: MergeRequestState,
    ) -> WorkflowResult<Vec<MergeRequest>> {
        self.list_merge_requests(repository, Some(state)).await
    }

    /// Lists the repository's merge requests, optionally filtered by state.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::NotFound`] for an unknown repository.
    pub async fn list_merge_requests(
        &self,
        repository: &str,
        state: Option<MergeRequestState>,
    ) -> WorkflowResult<Vec<MergeRequest>> {
        debug!(repository, state = ?state, "list merge requests");
        let repo = self.resolve(repository).await?;
        let merge_requests = match state {
            Some(filter) => {
                self.store
                    .list_merge_requests_by_state(repo.id(), filter)
                    .await?
            }
            None => self.store.list_merge_requests(repo.id()).await?,
        };
        Ok(merge_requests)
    }

    /// Rewrites a merge request's title and description.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::InvalidArgument`] for an invalid title and
    /// [`WorkflowError::NotFound`] when the merge request is unknown.
    pub async fn update_merge_request(
        &self,
        repository: &str,
        merge_request_id: MergeRequestId,
        title: &str,
        description: &str,
    ) -> WorkflowResult<MergeRequest> {
        debug!(repository, merge_request_id = %merge_request_id, "update merge request");
        let repo = self.resolve(repository).await?;
        let new_title = Title::new(title)?;
        self.store
            .update_merge_request(
                repo.id(),
                merge_request_id,
                &new_title,
                &Description::new(description),
                self.clock.utc(),
            )
            .await?;
        Ok(self
            .store
            .get_merge_request(repo.id(), merge_request_id)
            .await?)
    }

    /// Deletes a merge request.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::NotFound`] when the merge request is unknown.
    pub async fn delete_merge_request(
        &self,
        repository: &str,
        merge_request_id: MergeRequestId,
    ) -> WorkflowResult<()> {
        debug!(repository, merge_request_id = %merge_request_id, "delete merge request");
        let repo = self.resolve(repository).await?;
        Ok(self
            .store
            .delete_merge_request(repo.id(), merge_request_id)
            .await?)
    }

    /// Closes an open merge request without merging it.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::InvalidState`] unless the merge request is
    /// open.
    pub async fn close_merge_request(
        &self,
        repository: &str,
        merge_request_id: MergeRequestId,
        actor: &Actor,
    ) -> WorkflowResult<MergeRequest> {
        debug!(
            repository,
            merge_request_id = %merge_request_id,
            actor = actor.username(),
            "close merge request"
        );
        let repo = self.resolve(repository).await?;
        Ok(self
            .state_machine
            .close_merge_request(repo.id(), merge_request_id, actor.id())
            .await?)
    }

    /// Reopens a closed merge request.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::InvalidState`] unless the merge request is
    /// closed.
    pub async fn reopen_merge_request(
        &self,
        repository: &str,
        merge_request_id: MergeRequestId,
    ) -> WorkflowResult<MergeRequest> {
        debug!(repository, merge_request_id = %merge_request_id, "reopen merge request");
        let repo = self.resolve(repository).await?;
        Ok(self
            .state_machine
            .reopen_merge_request(repo.id(), merge_request_id)
            .await?)
    }

    /// Merges an open merge request in version control and marks it merged.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::InvalidState`] unless the merge request is
    /// open, [`WorkflowError::ExternalOperationFailure`] when checkout or
    /// merge fails or times out, and [`WorkflowError::Unrecorded`] when the
    /// merge commit exists but the state change could not be recorded.
    pub async fn merge_merge_request(
        &self,
        repository: &str,
        merge_request_id: MergeRequestId,
        actor: &Actor,
    ) -> WorkflowResult<MergeRequest> {
        debug!(
            repository,
            merge_request_id = %merge_request_id,
            actor = actor.username(),
            "merge merge request"
        );
        let repo = self.resolve(repository).await?;
        Ok(self
            .merge_executor
            .merge(&repo, merge_request_id, actor)
            .await?)
    }
}
