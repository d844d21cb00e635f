//! Port contracts for the workflow engine.
//!
//! Ports define infrastructure-agnostic interfaces used by workflow services.

pub mod directory;
pub mod store;
pub mod vcs;

pub use directory::RepositoryDirectory;
pub use store::{
    DependencyStore, IssueStore, MergeRequestStore, WorkflowStore, WorkflowStoreError,
    WorkflowStoreResult,
};
pub use vcs::{VcsError, VcsResult, VersionControl};
