//! Directed "depends-on" edges between issues of one repository.

use super::{IssueId, WorkflowDomainError};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

/// Edge recording that `issue_id` is blocked on `depends_on_id`.
///
/// Self edges are unrepresentable. Multi-hop cycles are not detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyEdge {
    issue_id: IssueId,
    depends_on_id: IssueId,
    created_at: DateTime<Utc>,
}

impl DependencyEdge {
    /// Creates an edge stamped with the current clock time.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowDomainError::SelfDependency`] when both endpoints
    /// are the same issue.
    pub fn new(
        issue_id: IssueId,
        depends_on_id: IssueId,
        clock: &impl Clock,
    ) -> Result<Self, WorkflowDomainError> {
        if issue_id == depends_on_id {
            return Err(WorkflowDomainError::SelfDependency(issue_id));
        }
        Ok(Self {
            issue_id,
            depends_on_id,
            created_at: clock.utc(),
        })
    }

    /// Returns the blocked issue.
    #[must_use]
    pub const fn issue_id(&self) -> IssueId {
        self.issue_id
    }

    /// Returns the issue being depended on.
    #[must_use]
    pub const fn depends_on_id(&self) -> IssueId {
        self.depends_on_id
    }

    /// Returns when the edge was created.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns whether `issue_id` is either endpoint of the edge.
    #[must_use]
    pub fn touches(&self, issue_id: IssueId) -> bool {
        self.issue_id == issue_id || self.depends_on_id == issue_id
    }
}
