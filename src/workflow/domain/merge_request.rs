//! Merge request aggregate, its lifecycle states and guarded transitions.

use super::{
    Actor, AuditStamp, BranchName, Description, MergeRequestId, ParseMergeRequestStateError,
    RepoId, Timestamped, Title, UserId, WorkflowDomainError,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Merge request lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeRequestState {
    /// Merge request is open for merging.
    Open,
    /// Merge request has been merged. Terminal.
    Merged,
    /// Merge request has been closed without merging.
    Closed,
}

impl MergeRequestState {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Merged => "merged",
            Self::Closed => "closed",
        }
    }

    /// Returns whether no transition leaves this state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Merged)
    }
}

impl fmt::Display for MergeRequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for MergeRequestState {
    type Error = ParseMergeRequestStateError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "open" => Ok(Self::Open),
            "merged" => Ok(Self::Merged),
            "closed" => Ok(Self::Closed),
            _ => Err(ParseMergeRequestStateError(value.to_owned())),
        }
    }
}

/// Guarded merge request transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MergeRequestTransition {
    /// `Open -> Closed`, recording who closed the merge request.
    Close {
        /// User closing the merge request.
        actor: UserId,
    },
    /// `Closed -> Open`, clearing the closure audit fields.
    Reopen,
    /// `Open -> Merged`, recording who merged the merge request.
    Merge {
        /// User merging the merge request.
        actor: UserId,
    },
}

impl MergeRequestTransition {
    /// Returns the state the merge request must be in for the transition to
    /// apply.
    #[must_use]
    pub const fn required_state(self) -> MergeRequestState {
        match self {
            Self::Close { .. } | Self::Merge { .. } => MergeRequestState::Open,
            Self::Reopen => MergeRequestState::Closed,
        }
    }

    /// Returns the state the merge request is in after the transition.
    #[must_use]
    pub const fn target_state(self) -> MergeRequestState {
        match self {
            Self::Close { .. } => MergeRequestState::Closed,
            Self::Reopen => MergeRequestState::Open,
            Self::Merge { .. } => MergeRequestState::Merged,
        }
    }

    /// Returns the operation name used in diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Close { .. } => "close",
            Self::Reopen => "reopen",
            Self::Merge { .. } => "merge",
        }
    }
}

/// Validated payload for inserting a new merge request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMergeRequest {
    repo_id: RepoId,
    author_id: UserId,
    title: Title,
    description: Description,
    source_branch: BranchName,
    target_branch: BranchName,
    created_at: DateTime<Utc>,
}

/// Content of a merge request supplied by its author.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeRequestContent {
    /// Title.
    pub title: Title,
    /// Description.
    pub description: Description,
    /// Branch whose commits are merged.
    pub source_branch: BranchName,
    /// Branch receiving the merge commit.
    pub target_branch: BranchName,
}

impl NewMergeRequest {
    /// Creates an insert payload stamped with the current clock time.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowDomainError::IdenticalBranches`] when the source and
    /// target branch are the same.
    pub fn new(
        repo_id: RepoId,
        author_id: UserId,
        content: MergeRequestContent,
        clock: &impl Clock,
    ) -> Result<Self, WorkflowDomainError> {
        if content.source_branch == content.target_branch {
            return Err(WorkflowDomainError::IdenticalBranches(
                content.source_branch.as_str().to_owned(),
            ));
        }

        Ok(Self {
            repo_id,
            author_id,
            title: content.title,
            description: content.description,
            source_branch: content.source_branch,
            target_branch: content.target_branch,
            created_at: clock.utc(),
        })
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

    /// Returns the source branch.
    #[must_use]
    pub const fn source_branch(&self) -> &BranchName {
        &self.source_branch
    }

    /// Returns the target branch.
    #[must_use]
    pub const fn target_branch(&self) -> &BranchName {
        &self.target_branch
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Merge request aggregate root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRequest {
    id: MergeRequestId,
    repo_id: RepoId,
    title: Title,
    description: Description,
    source_branch: BranchName,
    target_branch: BranchName,
    state: MergeRequestState,
    author_id: UserId,
    merged: Option<AuditStamp>,
    closed: Option<AuditStamp>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted merge request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedMergeRequestData {
    /// Persisted identifier.
    pub id: MergeRequestId,
    /// Owning repository.
    pub repo_id: RepoId,
    /// Persisted title.
    pub title: Title,
    /// Persisted description.
    pub description: Description,
    /// Persisted source branch.
    pub source_branch: BranchName,
    /// Persisted target branch.
    pub target_branch: BranchName,
    /// Persisted lifecycle state.
    pub state: MergeRequestState,
    /// Author of the merge request.
    pub author_id: UserId,
    /// User who merged, once merged.
    pub merged_by: Option<UserId>,
    /// Merge timestamp, once merged.
    pub merged_at: Option<DateTime<Utc>>,
    /// User who closed, while closed.
    pub closed_by: Option<UserId>,
    /// Closure timestamp, while closed.
    pub closed_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl MergeRequest {
    /// Materialises a freshly inserted merge request in the `Open` state.
    #[must_use]
    pub fn from_new(id: MergeRequestId, new_request: NewMergeRequest) -> Self {
        Self {
            id,
            repo_id: new_request.repo_id,
            title: new_request.title,
            description: new_request.description,
            source_branch: new_request.source_branch,
            target_branch: new_request.target_branch,
            state: MergeRequestState::Open,
            author_id: new_request.author_id,
            merged: None,
            closed: None,
            created_at: new_request.created_at,
            updated_at: new_request.created_at,
        }
    }

    /// Reconstructs a merge request from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowDomainError::InconsistentAuditFields`] when the
    /// merge or closure columns disagree with the persisted state.
    pub fn from_persisted(data: PersistedMergeRequestData) -> Result<Self, WorkflowDomainError> {
        let state = data.state;
        let inconsistent = |field: &'static str| WorkflowDomainError::InconsistentAuditFields {
            entity: "merge request",
            state: state.as_str(),
            field,
        };
        let merged = AuditStamp::from_columns(data.merged_by, data.merged_at)
            .map_err(|()| inconsistent("merged"))?;
        if merged.is_some() != (state == MergeRequestState::Merged) {
            return Err(inconsistent("merged"));
        }
        let closed = AuditStamp::from_columns(data.closed_by, data.closed_at)
            .map_err(|()| inconsistent("closed"))?;
        if closed.is_some() != (state == MergeRequestState::Closed) {
            return Err(inconsistent("closed"));
        }

        Ok(Self {
            id: data.id,
            repo_id: data.repo_id,
            title: data.title,
            description: data.description,
            source_branch: data.source_branch,
            target_branch: data.target_branch,
            state,
            author_id: data.author_id,
            merged,
            closed,
            created_at: data.created_at,
            updated_at: data.updated_at,
        })
    }

    /// Returns the merge request identifier.
    #[must_use]
    pub const fn id(&self) -> MergeRequestId {
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

    /// Returns the source branch.
    #[must_use]
    pub const fn source_branch(&self) -> &BranchName {
        &self.source_branch
    }

    /// Returns the target branch.
    #[must_use]
    pub const fn target_branch(&self) -> &BranchName {
        &self.target_branch
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub const fn state(&self) -> MergeRequestState {
        self.state
    }

    /// Returns the author.
    #[must_use]
    pub const fn author_id(&self) -> UserId {
        self.author_id
    }

    /// Returns who merged the merge request, once merged.
    #[must_use]
    pub fn merged_by(&self) -> Option<UserId> {
        self.merged.map(|stamp| stamp.actor())
    }

    /// Returns when the merge request was merged, once merged.
    #[must_use]
    pub fn merged_at(&self) -> Option<DateTime<Utc>> {
        self.merged.map(|stamp| stamp.at())
    }

    /// Returns who closed the merge request, while closed.
    #[must_use]
    pub fn closed_by(&self) -> Option<UserId> {
        self.closed.map(|stamp| stamp.actor())
    }

    /// Returns when the merge request was closed, while closed.
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

    /// Returns the commit message recorded for merging this request.
    ///
    /// The message is a pure function of the branches and the actor, so
    /// retried or audited merges produce identical text.
    #[must_use]
    pub fn merge_commit_message(&self, actor: &Actor) -> String {
        format!(
            "Merge branch '{}' into '{}'\n\nMerged-by: {}",
            self.source_branch,
            self.target_branch,
            actor.username()
        )
    }

    /// Rewrites the mutable content fields. Branches, state and audit fields
    /// are left untouched.
    pub fn rewrite(&mut self, title: Title, description: Description, at: DateTime<Utc>) {
        self.title = title;
        self.description = description;
        self.updated_at = at;
    }

    /// Applies a guarded transition in place.
    ///
    /// Returns `false`, leaving the merge request unchanged, when it is not
    /// in the transition's required state.
    pub fn apply_transition(
        &mut self,
        transition: MergeRequestTransition,
        at: DateTime<Utc>,
    ) -> bool {
        if self.state != transition.required_state() {
            return false;
        }
        match transition {
            MergeRequestTransition::Close { actor } => {
                self.closed = Some(AuditStamp::new(actor, at));
            }
            MergeRequestTransition::Reopen => self.closed = None,
            MergeRequestTransition::Merge { actor } => {
                self.merged = Some(AuditStamp::new(actor, at));
            }
        }
        self.state = transition.target_state();
        self.updated_at = at;
        true
    }
}

impl Timestamped for MergeRequest {
    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
