//! Merge execution: version-control merge followed by the guarded `Merged`
//! transition, serialised per repository working tree.

use super::state_machine::{StateMachine, TransitionError};
use crate::workflow::{
    domain::{
        Actor, MergeRequest, MergeRequestId, MergeRequestState, MergeRequestTransition, RepoId,
        Repository,
    },
    ports::{IssueStore, MergeRequestStore, VcsError, VersionControl, WorkflowStoreError},
};
use mockable::Clock;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

/// Exclusive per-repository locks over version-control working trees.
///
/// Holders of the guard for a repository are the only ones allowed to check
/// out or merge in its working tree. Each lock also remembers whether the
/// last version-control step in its tree was interrupted, so that the next
/// holder resets the tree before using it.
#[derive(Debug, Default)]
pub struct WorkingTreeLocks {
    locks: Mutex<HashMap<RepoId, Arc<AsyncMutex<WorkingTreeState>>>>,
}

#[derive(Debug, Default)]
struct WorkingTreeState {
    interrupted: bool,
}

/// Guard for one repository working tree; the lock is released on drop.
#[derive(Debug)]
pub struct WorkingTreeGuard {
    repo_id: RepoId,
    state: OwnedMutexGuard<WorkingTreeState>,
}

impl WorkingTreeGuard {
    /// Returns the repository whose working tree is held.
    #[must_use]
    pub const fn repo_id(&self) -> RepoId {
        self.repo_id
    }

    /// Reports whether a version-control step in this tree was cut short
    /// and the tree has not been reset since.
    #[must_use]
    pub fn needs_reset(&self) -> bool {
        self.state.interrupted
    }
}

impl WorkingTreeLocks {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to the working tree of `repo_id`.
    pub async fn acquire(&self, repo_id: RepoId) -> WorkingTreeGuard {
        let lock = {
            // Entries are inserted whole, so a poisoned table is still valid.
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(repo_id).or_default())
        };
        WorkingTreeGuard {
            repo_id,
            state: lock.lock_owned().await,
        }
    }
}

/// Errors returned by merge execution.
#[derive(Debug, Clone, Error)]
pub enum MergeError {
    /// The merge request is not open; nothing was done.
    #[error("merge request {merge_request_id} is {state}; only open merge requests can be merged")]
    NotOpen {
        /// Merge request identifier.
        merge_request_id: MergeRequestId,
        /// State observed before merging.
        state: MergeRequestState,
    },

    /// Checkout or merge failed; the merge request is unchanged.
    #[error("merging merge request {merge_request_id} failed: {source}")]
    Vcs {
        /// Merge request identifier.
        merge_request_id: MergeRequestId,
        /// Version-control failure.
        #[source]
        source: VcsError,
    },

    /// Checkout and merge did not finish in time; the merge request is
    /// unchanged.
    #[error("merging merge request {merge_request_id} timed out after {timeout:?}")]
    Timeout {
        /// Merge request identifier.
        merge_request_id: MergeRequestId,
        /// Configured bound.
        timeout: Duration,
    },

    /// The merge commit exists but the `Merged` state could not be
    /// committed. Needs manual reconciliation.
    #[error(
        "merge request {merge_request_id} was merged in version control but its state was not recorded: {source}"
    )]
    Unrecorded {
        /// Merge request identifier.
        merge_request_id: MergeRequestId,
        /// Why recording failed.
        #[source]
        source: TransitionError,
    },

    /// Reading the merge request failed, either before merging or after the
    /// `Merged` state was committed.
    #[error(transparent)]
    Store(#[from] WorkflowStoreError),
}

/// Result type for merge execution.
pub type MergeResult<T> = Result<T, MergeError>;

/// Merges merge requests in version control and records the outcome.
///
/// The working-tree lock of the repository is held from the initial state
/// read until the guarded transition has committed, so two merges in the
/// same repository never interleave their checkout and merge steps.
pub struct MergeExecutor<S, V, C>
where
    S: IssueStore + MergeRequestStore,
    V: VersionControl,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    version_control: Arc<V>,
    state_machine: StateMachine<S, C>,
    locks: Arc<WorkingTreeLocks>,
    timeout: Option<Duration>,
}

impl<S, V, C> MergeExecutor<S, V, C>
where
    S: IssueStore + MergeRequestStore,
    V: VersionControl,
    C: Clock + Send + Sync,
{
    /// Creates an executor with its own lock table and no timeout.
    #[must_use]
    pub fn new(store: Arc<S>, version_control: Arc<V>, clock: Arc<C>) -> Self {
        Self {
            state_machine: StateMachine::new(Arc::clone(&store), clock),
            store,
            version_control,
            locks: Arc::new(WorkingTreeLocks::new()),
            timeout: None,
        }
    }

    /// Shares `locks` with other executors operating on the same working
    /// trees.
    #[must_use]
    pub fn with_locks(mut self, locks: Arc<WorkingTreeLocks>) -> Self {
        self.locks = locks;
        self
    }

    /// Bounds the checkout-and-merge step by `timeout`.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Merges the merge request on behalf of `actor`.
    ///
    /// Checks out the target branch, merges the source branch without
    /// fast-forwarding and then applies the guarded `Open -> Merged`
    /// transition. Dropping the returned future before the version-control
    /// step completes never applies the transition; the next merge in the
    /// repository resets the working tree first.
    ///
    /// A failed or timed-out version-control step resets the working tree
    /// before the lock is released.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::NotOpen`] when the request is not open,
    /// [`MergeError::Vcs`] or [`MergeError::Timeout`] when the
    /// version-control step fails, [`MergeError::Unrecorded`] when the
    /// merge commit exists but the state change could not be committed, and
    /// [`MergeError::Store`] when the state change was committed but the
    /// merged request could not be read back.
    pub async fn merge(
        &self,
        repository: &Repository,
        merge_request_id: MergeRequestId,
        actor: &Actor,
    ) -> MergeResult<MergeRequest> {
        let repo_id = repository.id();
        let mut guard = self.locks.acquire(repo_id).await;
        debug!(
            repo_id = %guard.repo_id(),
            merge_request_id = %merge_request_id,
            "working tree locked"
        );

        let merge_request = self
            .store
            .get_merge_request(repo_id, merge_request_id)
            .await?;
        if merge_request.state() != MergeRequestState::Open {
            return Err(MergeError::NotOpen {
                merge_request_id,
                state: merge_request.state(),
            });
        }

        if guard.needs_reset() {
            warn!(
                repo_id = %repo_id,
                "working tree left behind by an interrupted merge; resetting"
            );
            self.version_control
                .reset_working_tree(repository)
                .await
                .map_err(|source| MergeError::Vcs {
                    merge_request_id,
                    source,
                })?;
            guard.state.interrupted = false;
        }

        guard.state.interrupted = true;
        let outcome = self
            .run_version_control(repository, &merge_request, actor)
            .await;
        if let Err(err) = outcome {
            self.restore_working_tree(repository, &mut guard).await;
            return Err(err);
        }
        guard.state.interrupted = false;

        let recorded = self
            .state_machine
            .transition_merge_request(
                repo_id,
                merge_request_id,
                MergeRequestTransition::Merge { actor: actor.id() },
            )
            .await;
        drop(guard);

        match recorded {
            Ok(merged) => {
                info!(
                    repo_id = %repo_id,
                    merge_request_id = %merge_request_id,
                    source = %merged.source_branch(),
                    target = %merged.target_branch(),
                    actor = actor.username(),
                    "merge request merged"
                );
                Ok(merged)
            }
            Err(TransitionError::Unreadable { source, .. }) => {
                warn!(
                    repo_id = %repo_id,
                    merge_request_id = %merge_request_id,
                    error = %source,
                    "merge recorded but the merged request could not be read back"
                );
                Err(MergeError::Store(source))
            }
            Err(source) => {
                error!(
                    repo_id = %repo_id,
                    merge_request_id = %merge_request_id,
                    error = %source,
                    "merge commit created but state not recorded; reconcile manually"
                );
                Err(MergeError::Unrecorded {
                    merge_request_id,
                    source,
                })
            }
        }
    }

    async fn restore_working_tree(&self, repository: &Repository, guard: &mut WorkingTreeGuard) {
        match self.version_control.reset_working_tree(repository).await {
            Ok(()) => {
                guard.state.interrupted = false;
                debug!(repo_id = %guard.repo_id(), "working tree reset");
            }
            Err(err) => error!(
                repo_id = %guard.repo_id(),
                error = %err,
                "failed to reset working tree; the next merge retries"
            ),
        }
    }

    async fn run_version_control(
        &self,
        repository: &Repository,
        merge_request: &MergeRequest,
        actor: &Actor,
    ) -> MergeResult<()> {
        let merge_request_id = merge_request.id();
        let message = merge_request.merge_commit_message(actor);
        let checkout_and_merge = async {
            self.version_control
                .checkout(repository, merge_request.target_branch())
                .await?;
            self.version_control
                .merge_no_ff(repository, merge_request.source_branch(), &message)
                .await
        };

        let outcome = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, checkout_and_merge)
                .await
                .map_err(|_elapsed| MergeError::Timeout {
                    merge_request_id,
                    timeout,
                })?,
            None => checkout_and_merge.await,
        };
        outcome.map_err(|source| MergeError::Vcs {
            merge_request_id,
            source,
        })
    }
}
