//! Version-control collaborator port used for branch checks and merges.

use crate::workflow::domain::{BranchName, Repository};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for version-control operations.
pub type VcsResult<T> = Result<T, VcsError>;

/// Black-box checkout and merge capability over a repository working tree.
///
/// Implementations do not serialise access to the working tree themselves;
/// callers hold the per-repository lock around every mutating call.
#[async_trait]
pub trait VersionControl: Send + Sync {
    /// Reports whether `branch` exists as a local branch of `repository`.
    async fn branch_exists(
        &self,
        repository: &Repository,
        branch: &BranchName,
    ) -> VcsResult<bool>;

    /// Checks out `branch` in the repository working tree.
    async fn checkout(&self, repository: &Repository, branch: &BranchName) -> VcsResult<()>;

    /// Merges `source` into the checked-out branch without fast-forwarding,
    /// recording `message` on the merge commit.
    ///
    /// A failed merge leaves no merge in progress.
    async fn merge_no_ff(
        &self,
        repository: &Repository,
        source: &BranchName,
        message: &str,
    ) -> VcsResult<()>;

    /// Discards any merge in progress and every uncommitted change in the
    /// working tree, leaving the checked-out branch at its last commit.
    ///
    /// Used to recover a working tree whose merge was interrupted, for
    /// example by a timeout killing the version-control process.
    async fn reset_working_tree(&self, repository: &Repository) -> VcsResult<()>;
}

/// Errors returned by version-control implementations.
#[derive(Debug, Clone, Error)]
pub enum VcsError {
    /// The branch does not exist in the repository.
    #[error("branch '{branch}' does not exist in repository '{repository}'")]
    BranchNotFound {
        /// Repository name.
        repository: String,
        /// Missing branch.
        branch: String,
    },

    /// A version-control command ran and reported failure.
    #[error("{operation} failed in repository '{repository}': {detail}")]
    CommandFailed {
        /// Operation name, for example `checkout` or `merge`.
        operation: &'static str,
        /// Repository name.
        repository: String,
        /// Diagnostic output from the command.
        detail: String,
    },

    /// The version-control program could not be run.
    #[error("failed to run version control: {0}")]
    Io(Arc<std::io::Error>),
}

impl VcsError {
    /// Wraps an I/O failure launching or awaiting the version-control
    /// program.
    #[must_use]
    pub fn io(err: std::io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}
