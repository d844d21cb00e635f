//! Diesel row models for workflow persistence.

use super::schema::{issue_dependencies, issues, merge_requests};
use chrono::{DateTime, Utc};
use diesel::prelude::*;

/// Query result row for issue records.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = issues)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct IssueRow {
    /// Issue identifier.
    pub id: i64,
    /// Owning repository identifier.
    pub repo_id: i64,
    /// Title.
    pub title: String,
    /// Description.
    pub description: String,
    /// Lifecycle state.
    pub state: String,
    /// Author user identifier.
    pub author_id: i64,
    /// User who closed the issue.
    pub closed_by: Option<i64>,
    /// Closure timestamp.
    pub closed_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Insert model for issue records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = issues)]
pub struct NewIssueRow {
    /// Owning repository identifier.
    pub repo_id: i64,
    /// Title.
    pub title: String,
    /// Description.
    pub description: String,
    /// Lifecycle state.
    pub state: String,
    /// Author user identifier.
    pub author_id: i64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Query result row for merge request records.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = merge_requests)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct MergeRequestRow {
    /// Merge request identifier.
    pub id: i64,
    /// Owning repository identifier.
    pub repo_id: i64,
    /// Title.
    pub title: String,
    /// Description.
    pub description: String,
    /// Source branch.
    pub source_branch: String,
    /// Target branch.
    pub target_branch: String,
    /// Lifecycle state.
    pub state: String,
    /// Author user identifier.
    pub author_id: i64,
    /// User who merged.
    pub merged_by: Option<i64>,
    /// Merge timestamp.
    pub merged_at: Option<DateTime<Utc>>,
    /// User who closed.
    pub closed_by: Option<i64>,
    /// Closure timestamp.
    pub closed_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Insert model for merge request records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = merge_requests)]
pub struct NewMergeRequestRow {
    /// Owning repository identifier.
    pub repo_id: i64,
    /// Title.
    pub title: String,
    /// Description.
    pub description: String,
    /// Source branch.
    pub source_branch: String,
    /// Target branch.
    pub target_branch: String,
    /// Lifecycle state.
    pub state: String,
    /// Author user identifier.
    pub author_id: i64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Insert model for dependency edges.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = issue_dependencies)]
pub struct NewDependencyRow {
    /// Blocked issue.
    pub issue_id: i64,
    /// Issue depended on.
    pub depends_on_id: i64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}
