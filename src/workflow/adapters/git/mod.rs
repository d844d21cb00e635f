//! Version control through the `git` command line.
//!
//! Each repository has a working tree at `<repositories_root>/<name>`. Git
//! runs as a child process with `-C <working tree>`; children are killed
//! when the future awaiting them is dropped, so a timed-out or cancelled
//! merge does not keep running in the background.

use crate::config::GitConfig;
use crate::workflow::{
    domain::{BranchName, Repository},
    ports::{VcsError, VcsResult, VersionControl},
};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::warn;

/// [`VersionControl`] implementation shelling out to `git`.
#[derive(Debug, Clone)]
pub struct GitCliVersionControl {
    program: String,
    repositories_root: PathBuf,
}

impl GitCliVersionControl {
    /// Creates an adapter running `program` against working trees under
    /// `repositories_root`.
    #[must_use]
    pub fn new(program: impl Into<String>, repositories_root: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            repositories_root: repositories_root.into(),
        }
    }

    /// Creates an adapter from the `[git]` configuration section.
    #[must_use]
    pub fn from_config(config: &GitConfig) -> Self {
        Self::new(config.program.as_str(), config.repositories_root.as_path())
    }

    /// Returns the working tree directory of `repository`.
    #[must_use]
    pub fn working_tree(&self, repository: &Repository) -> PathBuf {
        self.repositories_root.join(repository.name().as_str())
    }

    async fn git(&self, working_tree: &Path, args: &[&str]) -> VcsResult<Output> {
        Command::new(&self.program)
            .arg("-C")
            .arg(working_tree)
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(VcsError::io)
    }
}

fn ensure_success(
    operation: &'static str,
    repository: &Repository,
    output: &Output,
) -> VcsResult<()> {
    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let detail = [stderr.trim(), stdout.trim()]
        .into_iter()
        .find(|text| !text.is_empty())
        .map_or_else(|| output.status.to_string(), str::to_owned);

    Err(VcsError::CommandFailed {
        operation,
        repository: repository.name().to_string(),
        detail,
    })
}

#[async_trait]
impl VersionControl for GitCliVersionControl {
    async fn branch_exists(
        &self,
        repository: &Repository,
        branch: &BranchName,
    ) -> VcsResult<bool> {
        let working_tree = self.working_tree(repository);
        let ref_name = branch.ref_name();
        let output = self
            .git(
                &working_tree,
                &["show-ref", "--verify", "--quiet", ref_name.as_str()],
            )
            .await?;

        // `show-ref --verify` exits 1 for a missing ref and 128 for a broken
        // repository.
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => ensure_success("show-ref", repository, &output).map(|()| false),
        }
    }

    async fn checkout(&self, repository: &Repository, branch: &BranchName) -> VcsResult<()> {
        if !self.branch_exists(repository, branch).await? {
            return Err(VcsError::BranchNotFound {
                repository: repository.name().to_string(),
                branch: branch.as_str().to_owned(),
            });
        }

        let working_tree = self.working_tree(repository);
        let output = self
            .git(&working_tree, &["checkout", "--quiet", branch.as_str()])
            .await?;
        ensure_success("checkout", repository, &output)
    }

    async fn merge_no_ff(
        &self,
        repository: &Repository,
        source: &BranchName,
        message: &str,
    ) -> VcsResult<()> {
        let working_tree = self.working_tree(repository);
        let output = self
            .git(
                &working_tree,
                &["merge", "--no-ff", "--no-edit", "-m", message, source.as_str()],
            )
            .await?;

        let merged = ensure_success("merge", repository, &output);
        if merged.is_err() {
            let abort = self.git(&working_tree, &["merge", "--abort"]).await;
            let aborted = abort.and_then(|abort_output| {
                ensure_success("merge --abort", repository, &abort_output)
            });
            if let Err(abort_err) = aborted {
                warn!(
                    repository = %repository.name(),
                    error = %abort_err,
                    "failed to abort merge; resetting working tree"
                );
                if let Err(reset_err) = self.reset_working_tree(repository).await {
                    warn!(
                        repository = %repository.name(),
                        error = %reset_err,
                        "failed to reset working tree; it may need manual cleanup"
                    );
                }
            }
        }
        merged
    }

    async fn reset_working_tree(&self, repository: &Repository) -> VcsResult<()> {
        let working_tree = self.working_tree(repository);

        // A git process killed while writing the index leaves its lock file
        // behind; nothing else may run in this tree while the caller holds
        // the working-tree lock.
        let index_lock = working_tree.join(".git").join("index.lock");
        match tokio::fs::remove_file(&index_lock).await {
            Ok(()) => warn!(
                repository = %repository.name(),
                "removed stale index lock"
            ),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(VcsError::io(err)),
        }

        let output = self
            .git(&working_tree, &["reset", "--hard", "--quiet", "HEAD"])
            .await?;
        ensure_success("reset", repository, &output)
    }
}
