//! Issue aggregate, its lifecycle states and guarded transitions.

use super::{
    AuditStamp, Description, IssueId, ParseIssueStateError, RepoId, Timestamped, Title, UserId,
    WorkflowDomainError,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Issue lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueState {
    /// Issue is open.
    Open,
    /// Issue has been closed.
    Closed,
}

impl IssueState {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for IssueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for IssueState {
    type Error = ParseIssueStateError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            _ => Err(ParseIssueStateError(value.to_owned())),
        }
    }
}

/// Guarded issue transition.
///
/// Each transition applies only while the issue is in
/// [`Self::required_state`]; stores implement it as a conditional update on
/// the state column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssueTransition {
    /// `Open -> Closed`, recording who closed the issue.
    Close {
        /// User closing the issue.
        actor: UserId,
    },
    /// `Closed -> Open`, clearing the closure audit fields.
    Reopen,
}

impl IssueTransition {
    /// Returns the state the issue must be in for the transition to apply.
    #[must_use]
    pub const fn required_state(self) -> IssueState {
        match self {
            Self::Close { .. } => IssueState::Open,
            Self::Reopen => IssueState::Closed,
        }
    }

    /// Returns the state the issue is in after the transition.
    #[must_use]
    pub const fn target_state(self) -> IssueState {
        match self {
            Self::Close { .. } => IssueState::Closed,
            Self::Reopen => IssueState::Open,
        }
    }

    /// Returns the operation name used in diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Close { .. } => "close",
            Self::Reopen => "reopen",
        }
    }

    /// Returns the closure stamp written by the transition, if any.
    #[must_use]
    pub const fn closure_at(self, at: DateTime<Utc>) -> Option<AuditStamp> {
        match self {
            Self::Close { actor } => Some(AuditStamp::new(actor, at)),
            Self::Reopen => None,
        }
    }
}

/// Validated payload for inserting a new issue.
///
/// The identifier is assigned by the store on insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIssue {
    repo_id: RepoId,
    author_id: UserId,
    title: Title,
    description: Description,
    created_at: DateTime<Utc>,
}

impl NewIssue {
    /// Creates an insert payload stamped with the current clock time.
    #[must_use]
    pub fn new(
        repo_id: RepoId,
        author_id: UserId,
        title: Title,
        description: Description,
        clock: &impl Clock,
    ) -> Self {
        Self {
            repo_id,
            author_id,
            title,
            description,
            created_at: clock.utc(),
        }
    }

    /// Returns the owning repository.
    #[must_use]
    pub const fn repo_id(&self) -> RepoId {
        self.repo_id
    }

    /// Returns the author.
    #[must_use]
    pub const fn author_id(&self) -> UserId {
        self.author_id
    }

    /// Returns the title.
    #[must_use]
    pub const fn title(&self) -> &Title {
        &self.title
    }

    /// Returns the description.
    #[must_use]
    pub const fn description(&self) -> &Description {
        &self.description
    }

    /// Returns the creation timestamp, also used as the initial update time.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Issue aggregate root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    id: IssueId,
    repo_id: RepoId,
    title: Title,
    description: Description,
    state: IssueState,
    author_id: UserId,
    closed: Option<AuditStamp>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedIssueData {
    /// Persisted identifier.
    pub id: IssueId,
    /// Owning repository.
    pub repo_id: RepoId,
    /// Persisted title.
    pub title: Title,
    /// Persisted description.
    pub description: Description,
    /// Persisted lifecycle state.
    pub state: IssueState,
    /// Author of the issue.
    pub author_id: UserId,
    /// User who closed the issue, if closed.
    pub closed_by: Option<UserId>,
    /// Closure timestamp, if closed.
    pub closed_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Issue {
    /// Materialises a freshly inserted issue in the initial `Open` state.
    #[must_use]
    pub fn from_new(id: IssueId, new_issue: NewIssue) -> Self {
        Self {
            id,
            repo_id: new_issue.repo_id,
            title: new_issue.title,
            description: new_issue.description,
            state: IssueState::Open,
            author_id: new_issue.author_id,
            closed: None,
            created_at: new_issue.created_at,
            updated_at: new_issue.created_at,
        }
    }

    /// Reconstructs an issue from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowDomainError::InconsistentAuditFields`] when the
    /// closure columns are half set, or are set on an open issue, or are
    /// missing on a closed one.
    pub fn from_persisted(data: PersistedIssueData) -> Result<Self, WorkflowDomainError> {
        let inconsistent = || WorkflowDomainError::InconsistentAuditFields {
            entity: "issue",
            state: data.state.as_str(),
            field: "closed",
        };
        let closed =
            AuditStamp::from_columns(data.closed_by, data.closed_at).map_err(|()| inconsistent())?;
        if closed.is_some() != (data.state == IssueState::Closed) {
            return Err(inconsistent());
        }

        Ok(Self {
            id: data.id,
            repo_id: data.repo_id,
            title: data.title,
            description: data.description,
            state: data.state,
            author_id: data.author_id,
            closed,
            created_at: data.created_at,
            updated_at: data.updated_at,
        })
    }

    /// Returns the issue identifier.
    #[must_use]
    pub const fn id(&self) -> IssueId {
        self.id
    }

    /// Returns the owning repository.
    #[must_use]
    pub const fn repo_id(&self) -> RepoId {
        self.repo_id
    }

    /// Returns the title.
    #[must_use]
    pub const fn title(&self) -> &Title {
        &self.title
    }

    /// Returns the description.
    #[must_use]
    pub const fn description(&self) -> &Description {
        &self.description
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub const fn state(&self) -> IssueState {
        self.state
    }

    /// Returns the author.
    #[must_use]
    pub const fn author_id(&self) -> UserId {
        self.author_id
    }

    /// Returns who closed the issue, while it is closed.
    #[must_use]
    pub fn closed_by(&self) -> Option<UserId> {
        self.closed.map(|stamp| stamp.actor())
    }

    /// Returns when the issue was closed, while it is closed.
    #[must_use]
    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.closed.map(|stamp| stamp.at())
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest update timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Rewrites the mutable content fields. State and audit fields are left
    /// untouched.
    pub fn rewrite(&mut self, title: Title, description: Description, at: DateTime<Utc>) {
        self.title = title;
        self.description = description;
        self.updated_at = at;
    }

    /// Applies a guarded transition in place.
    ///
    /// Returns `false`, leaving the issue unchanged, when the issue is not in
    /// the transition's required state.
    pub fn apply_transition(&mut self, transition: IssueTransition, at: DateTime<Utc>) -> bool {
        if self.state != transition.required_state() {
            return false;
        }
        self.state = transition.target_state();
        self.closed = transition.closure_at(at);
        self.updated_at = at;
        true
    }
}

impl Timestamped for Issue {
    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
