//! Domain model for the workflow engine.
//!
//! Issues, merge requests and dependency edges, together with the guarded
//! transitions that move issues and merge requests through their lifecycle.
//! Nothing in here touches storage or version control.

mod audit;
mod branch;
mod content;
mod dependency;
mod error;
mod ids;
mod issue;
mod merge_request;
mod repository;

pub use audit::{AuditStamp, Timestamped, sort_by_recent_activity};
pub use branch::BranchName;
pub use content::{Description, Title};
pub use dependency::DependencyEdge;
pub use error::{ParseIssueStateError, ParseMergeRequestStateError, WorkflowDomainError};
pub use ids::{IssueId, MergeRequestId, RepoId, UserId};
pub use issue::{Issue, IssueState, IssueTransition, NewIssue, PersistedIssueData};
pub use merge_request::{
    MergeRequest, MergeRequestContent, MergeRequestState, MergeRequestTransition,
    NewMergeRequest, PersistedMergeRequestData,
};
pub use repository::{Actor, Repository, RepositoryName};
