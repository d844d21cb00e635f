//! Guarded lifecycle transitions for issues and merge requests.

use crate::workflow::{
    domain::{
        Issue, IssueId, IssueTransition, MergeRequest, MergeRequestId, MergeRequestTransition,
        RepoId, UserId,
    },
    ports::{IssueStore, MergeRequestStore, WorkflowStoreError},
};
use mockable::Clock;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Errors returned by guarded transitions.
#[derive(Debug, Clone, Error)]
pub enum TransitionError {
    /// The entity was not in the transition's required state, so the
    /// conditional update matched no row.
    #[error("cannot {transition} {entity} {id}: it is {current}")]
    InvalidState {
        /// Entity kind, `issue` or `merge request`.
        entity: &'static str,
        /// Entity identifier.
        id: i64,
        /// State observed after the refused update.
        current: &'static str,
        /// Transition that was refused.
        transition: &'static str,
    },

    /// The transition was committed but the updated entity could not be
    /// read back.
    #[error("{entity} {id} was updated but could not be read back: {source}")]
    Unreadable {
        /// Entity kind, `issue` or `merge request`.
        entity: &'static str,
        /// Entity identifier.
        id: i64,
        /// Read failure.
        #[source]
        source: WorkflowStoreError,
    },

    /// Store operation failed, including the entity not existing.
    #[error(transparent)]
    Store(#[from] WorkflowStoreError),
}

/// Result type for guarded transitions.
pub type TransitionResult<T> = Result<T, TransitionError>;

/// Applies guarded transitions through the store's conditional update.
///
/// Each transition is a compare-and-swap on the state column: of several
/// callers racing on one entity exactly one matches a row, the others get
/// [`TransitionError::InvalidState`]. A zero-row outcome is re-read to tell
/// a missing entity (`NotFound` from the store) from a state mismatch.
pub struct StateMachine<S, C>
where
    S: IssueStore + MergeRequestStore,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    clock: Arc<C>,
}

impl<S, C> StateMachine<S, C>
where
    S: IssueStore + MergeRequestStore,
    C: Clock + Send + Sync,
{
    /// Creates a state machine over `store`.
    #[must_use]
    pub const fn new(store: Arc<S>, clock: Arc<C>) -> Self {
        Self { store, clock }
    }

    /// Closes an open issue on behalf of `actor`.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::InvalidState`] when the issue is already
    /// closed and [`TransitionError::Store`] when it does not exist.
    pub async fn close_issue(
        &self,
        repo_id: RepoId,
        issue_id: IssueId,
        actor: UserId,
    ) -> TransitionResult<Issue> {
        self.transition_issue(repo_id, issue_id, IssueTransition::Close { actor })
            .await
    }

    /// Reopens a closed issue, clearing its closure audit fields.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::InvalidState`] when the issue is already
    /// open and [`TransitionError::Store`] when it does not exist.
    pub async fn reopen_issue(
        &self,
        repo_id: RepoId,
        issue_id: IssueId,
    ) -> TransitionResult<Issue> {
        self.transition_issue(repo_id, issue_id, IssueTransition::Reopen)
            .await
    }

    /// Applies an issue transition and returns the updated issue.
    ///
    /// # Errors
    ///
    /// See [`Self::close_issue`].
    pub async fn transition_issue(
        &self,
        repo_id: RepoId,
        issue_id: IssueId,
        transition: IssueTransition,
    ) -> TransitionResult<Issue> {
        let matched = self
            .store
            .transition_issue(repo_id, issue_id, transition, self.clock.utc())
            .await?;

        if matched == 0 {
            let current = self.store.get_issue(repo_id, issue_id).await?;
            warn!(
                repo_id = %repo_id,
                issue_id = %issue_id,
                transition = transition.name(),
                state = %current.state(),
                "refused issue transition"
            );
            return Err(TransitionError::InvalidState {
                entity: "issue",
                id: issue_id.value(),
                current: current.state().as_str(),
                transition: transition.name(),
            });
        }

        let issue = self
            .store
            .get_issue(repo_id, issue_id)
            .await
            .map_err(|source| TransitionError::Unreadable {
                entity: "issue",
                id: issue_id.value(),
                source,
            })?;
        info!(
            repo_id = %repo_id,
            issue_id = %issue_id,
            transition = transition.name(),
            state = %issue.state(),
            "issue transitioned"
        );
        Ok(issue)
    }

    /// Closes an open merge request on behalf of `actor`.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::InvalidState`] unless the merge request is
    /// open.
    pub async fn close_merge_request(
        &self,
        repo_id: RepoId,
        merge_request_id: MergeRequestId,
        actor: UserId,
    ) -> TransitionResult<MergeRequest> {
        self.transition_merge_request(
            repo_id,
            merge_request_id,
            MergeRequestTransition::Close { actor },
        )
        .await
    }

    /// Reopens a closed merge request.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::InvalidState`] unless the merge request is
    /// closed. Merged requests can never be reopened.
    pub async fn reopen_merge_request(
        &self,
        repo_id: RepoId,
        merge_request_id: MergeRequestId,
    ) -> TransitionResult<MergeRequest> {
        self.transition_merge_request(repo_id, merge_request_id, MergeRequestTransition::Reopen)
            .await
    }

    /// Applies a merge request transition and returns the updated request.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::InvalidState`] when the required state did
    /// not hold, [`TransitionError::Store`] when the request does not exist
    /// or the update fails, and [`TransitionError::Unreadable`] when the
    /// update was committed but reading the request back failed.
    pub async fn transition_merge_request(
        &self,
        repo_id: RepoId,
        merge_request_id: MergeRequestId,
        transition: MergeRequestTransition,
    ) -> TransitionResult<MergeRequest> {
        let matched = self
            .store
            .transition_merge_request(repo_id, merge_request_id, transition, self.clock.utc())
            .await?;

        if matched == 0 {
            let current = self
                .store
                .get_merge_request(repo_id, merge_request_id)
                .await?;
            warn!(
                repo_id = %repo_id,
                merge_request_id = %merge_request_id,
                transition = transition.name(),
                state = %current.state(),
                "refused merge request transition"
            );
            return Err(TransitionError::InvalidState {
                entity: "merge request",
                id: merge_request_id.value(),
                current: current.state().as_str(),
                transition: transition.name(),
            });
        }

        let merge_request = self
            .store
            .get_merge_request(repo_id, merge_request_id)
            .await
            .map_err(|source| TransitionError::Unreadable {
                entity: "merge request",
                id: merge_request_id.value(),
                source,
            })?;
        info!(
            repo_id = %repo_id,
            merge_request_id = %merge_request_id,
            transition = transition.name(),
            state = %merge_request.state(),
            "merge request transitioned"
        );
        Ok(merge_request)
    }
}
