//! In-memory version control for merge executor tests.

use crate::workflow::{
    domain::{BranchName, RepoId, Repository},
    ports::{VcsError, VcsResult, VersionControl},
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockWriteGuard};
use std::time::Duration;

/// A merge performed by [`InMemoryVersionControl`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedMerge {
    /// Repository the merge ran in.
    pub repo_id: RepoId,
    /// Branch that was merged.
    pub source: BranchName,
    /// Branch that was checked out and received the merge commit.
    pub target: BranchName,
    /// Merge commit message.
    pub message: String,
}

/// In-memory version control adapter.
///
/// Models branches, the checked-out branch and merge commits per repository
/// without touching disk. Merge failures and merge latency can be injected
/// to exercise the error and concurrency paths of the merge executor.
///
/// A merge that is dropped while delayed leaves its working tree dirty, the
/// way a killed `git merge` does: checkouts and merges in that repository
/// fail until [`VersionControl::reset_working_tree`] runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryVersionControl {
    state: Arc<RwLock<InMemoryVcsState>>,
}

#[derive(Debug, Default)]
struct InMemoryVcsState {
    branches: HashMap<RepoId, HashSet<BranchName>>,
    checked_out: HashMap<RepoId, BranchName>,
    merge_failures: HashMap<RepoId, String>,
    merge_delay: Option<Duration>,
    merges: Vec<RecordedMerge>,
    dirty: HashSet<RepoId>,
    resets: usize,
}

impl InMemoryVersionControl {
    /// Creates an adapter with no repositories or branches.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn write(&self) -> VcsResult<RwLockWriteGuard<'_, InMemoryVcsState>> {
        self.state
            .write()
            .map_err(|err| VcsError::io(std::io::Error::other(err.to_string())))
    }

    /// Creates `branch` in the repository.
    ///
    /// # Errors
    ///
    /// Returns [`VcsError::Io`] when lock acquisition fails.
    pub fn add_branch(&self, repository: &Repository, branch: BranchName) -> VcsResult<()> {
        let mut state = self.write()?;
        state
            .branches
            .entry(repository.id())
            .or_default()
            .insert(branch);
        Ok(())
    }

    /// Deletes `branch` from the repository.
    ///
    /// # Errors
    ///
    /// Returns [`VcsError::Io`] when lock acquisition fails.
    pub fn delete_branch(&self, repository: &Repository, branch: &BranchName) -> VcsResult<()> {
        let mut state = self.write()?;
        if let Some(branches) = state.branches.get_mut(&repository.id()) {
            branches.remove(branch);
        }
        Ok(())
    }

    /// Makes every subsequent merge in the repository fail with `detail`.
    ///
    /// # Errors
    ///
    /// Returns [`VcsError::Io`] when lock acquisition fails.
    pub fn fail_merges(&self, repository: &Repository, detail: impl Into<String>) -> VcsResult<()> {
        let mut state = self.write()?;
        state
            .merge_failures
            .insert(repository.id(), detail.into().trim().to_owned());
        Ok(())
    }

    /// Delays every merge by `delay` before it takes effect.
    ///
    /// # Errors
    ///
    /// Returns [`VcsError::Io`] when lock acquisition fails.
    pub fn set_merge_delay(&self, delay: Duration) -> VcsResult<()> {
        let mut state = self.write()?;
        state.merge_delay = Some(delay);
        Ok(())
    }

    /// Returns every merge performed so far, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`VcsError::Io`] when lock acquisition fails.
    pub fn merges(&self) -> VcsResult<Vec<RecordedMerge>> {
        let state = self
            .state
            .read()
            .map_err(|err| VcsError::io(std::io::Error::other(err.to_string())))?;
        Ok(state.merges.clone())
    }

    /// Returns how many times a working tree has been reset.
    ///
    /// # Errors
    ///
    /// Returns [`VcsError::Io`] when lock acquisition fails.
    pub fn reset_count(&self) -> VcsResult<usize> {
        let state = self
            .state
            .read()
            .map_err(|err| VcsError::io(std::io::Error::other(err.to_string())))?;
        Ok(state.resets)
    }

    /// Reports whether an interrupted merge left the working tree dirty.
    ///
    /// # Errors
    ///
    /// Returns [`VcsError::Io`] when lock acquisition fails.
    pub fn is_dirty(&self, repository: &Repository) -> VcsResult<bool> {
        let state = self
            .state
            .read()
            .map_err(|err| VcsError::io(std::io::Error::other(err.to_string())))?;
        Ok(state.dirty.contains(&repository.id()))
    }
}

fn dirty_tree(operation: &'static str, repository: &Repository) -> VcsError {
    VcsError::CommandFailed {
        operation,
        repository: repository.name().to_string(),
        detail: "working tree has uncommitted changes from an interrupted merge".to_owned(),
    }
}

fn branch_not_found(repository: &Repository, branch: &BranchName) -> VcsError {
    VcsError::BranchNotFound {
        repository: repository.name().to_string(),
        branch: branch.as_str().to_owned(),
    }
}

#[async_trait]
impl VersionControl for InMemoryVersionControl {
    async fn branch_exists(
        &self,
        repository: &Repository,
        branch: &BranchName,
    ) -> VcsResult<bool> {
        let state = self
            .state
            .read()
            .map_err(|err| VcsError::io(std::io::Error::other(err.to_string())))?;
        Ok(state
            .branches
            .get(&repository.id())
            .is_some_and(|branches| branches.contains(branch)))
    }

    async fn checkout(&self, repository: &Repository, branch: &BranchName) -> VcsResult<()> {
        let mut state = self.write()?;
        if state.dirty.contains(&repository.id()) {
            return Err(dirty_tree("checkout", repository));
        }
        let exists = state
            .branches
            .get(&repository.id())
            .is_some_and(|branches| branches.contains(branch));
        if !exists {
            return Err(branch_not_found(repository, branch));
        }
        state.checked_out.insert(repository.id(), branch.clone());
        Ok(())
    }

    async fn merge_no_ff(
        &self,
        repository: &Repository,
        source: &BranchName,
        message: &str,
    ) -> VcsResult<()> {
        let delay = {
            let mut state = self.write()?;
            if !state.dirty.insert(repository.id()) {
                return Err(dirty_tree("merge", repository));
            }
            state.merge_delay
        };
        if let Some(pause) = delay {
            tokio::time::sleep(pause).await;
        }

        let mut state = self.write()?;
        state.dirty.remove(&repository.id());
        if let Some(detail) = state.merge_failures.get(&repository.id()) {
            return Err(VcsError::CommandFailed {
                operation: "merge",
                repository: repository.name().to_string(),
                detail: detail.clone(),
            });
        }
        let source_exists = state
            .branches
            .get(&repository.id())
            .is_some_and(|branches| branches.contains(source));
        if !source_exists {
            return Err(branch_not_found(repository, source));
        }
        let target = state
            .checked_out
            .get(&repository.id())
            .cloned()
            .ok_or_else(|| VcsError::CommandFailed {
                operation: "merge",
                repository: repository.name().to_string(),
                detail: "no branch is checked out".to_owned(),
            })?;

        state.merges.push(RecordedMerge {
            repo_id: repository.id(),
            source: source.clone(),
            target,
            message: message.to_owned(),
        });
        Ok(())
    }

    async fn reset_working_tree(&self, repository: &Repository) -> VcsResult<()> {
        let mut state = self.write()?;
        state.dirty.remove(&repository.id());
        state.resets += 1;
        Ok(())
    }
}
