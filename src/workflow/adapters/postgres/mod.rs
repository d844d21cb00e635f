//! `PostgreSQL` adapters for workflow persistence.

pub(crate) mod models;
mod repository;
mod schema;

#[cfg(test)]
pub(crate) use repository::{row_to_issue, row_to_merge_request};
pub use repository::{PostgresWorkflowStore, WorkflowPgPool};

use crate::workflow::ports::WorkflowStoreError;

impl From<diesel::result::Error> for WorkflowStoreError {
    fn from(err: diesel::result::Error) -> Self {
        Self::persistence(err)
    }
}
