//! Error types for workflow domain validation and parsing.

use super::IssueId;
use thiserror::Error;

/// Errors returned while constructing workflow domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WorkflowDomainError {
    /// The title is empty after trimming.
    #[error("title must not be empty")]
    EmptyTitle,

    /// The title exceeds the storage limit.
    #[error("title exceeds {max} characters (got {actual})")]
    TitleTooLong {
        /// Maximum permitted length in characters.
        max: usize,
        /// Length of the rejected title in characters.
        actual: usize,
    },

    /// The branch name is not a valid Git branch name.
    #[error("invalid branch name '{0}'")]
    InvalidBranchName(String),

    /// A merge request must merge between two different branches.
    #[error("source and target branch are both '{0}'")]
    IdenticalBranches(String),

    /// An issue cannot depend on itself.
    #[error("issue {0} cannot depend on itself")]
    SelfDependency(IssueId),

    /// The repository name is empty or malformed.
    #[error("invalid repository name '{0}'")]
    InvalidRepositoryName(String),

    /// The actor username is empty after trimming.
    #[error("username must not be empty")]
    EmptyUsername,

    /// Persisted audit columns disagree with the persisted state.
    #[error("{entity} in state '{state}' has inconsistent {field} audit fields")]
    InconsistentAuditFields {
        /// Entity kind, `issue` or `merge request`.
        entity: &'static str,
        /// Persisted state in canonical form.
        state: &'static str,
        /// Audit field pair that is inconsistent, `closed` or `merged`.
        field: &'static str,
    },
}

/// Error returned while parsing issue states.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown issue state: {0}")]
pub struct ParseIssueStateError(pub String);

/// Error returned while parsing merge request states.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown merge request state: {0}")]
pub struct ParseMergeRequestStateError(pub String);
