//! Repository and actor identity as handed over by external collaborators.

use super::{RepoId, UserId, WorkflowDomainError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sanitised repository name used to resolve a [`Repository`].
///
/// Surrounding whitespace, leading and trailing slashes, and a trailing
/// `.git` suffix are stripped, so `"/team/app.git"` and `"team/app"` name the
/// same repository.
///
/// # Examples
///
///     use trellis::workflow::domain::RepositoryName;
///
///     let name = RepositoryName::new(" /team/app.git ").expect("valid");
///     assert_eq!(name.as_str(), "team/app");
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepositoryName(String);

impl RepositoryName {
    /// Creates a sanitised repository name.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowDomainError::InvalidRepositoryName`] when nothing is
    /// left after sanitising, or when the name contains whitespace, empty
    /// path segments or `.`/`..` segments.
    pub fn new(value: impl Into<String>) -> Result<Self, WorkflowDomainError> {
        let raw = value.into();
        let trimmed = raw.trim().trim_matches('/');
        let normalized = trimmed.strip_suffix(".git").unwrap_or(trimmed);

        let is_valid = !normalized.is_empty()
            && !normalized.chars().any(char::is_whitespace)
            && normalized
                .split('/')
                .all(|segment| !segment.is_empty() && segment != "." && segment != "..");

        if !is_valid {
            return Err(WorkflowDomainError::InvalidRepositoryName(raw));
        }

        Ok(Self(normalized.to_owned()))
    }

    /// Returns the repository name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for RepositoryName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for RepositoryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A resolved repository: its store identifier and canonical name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Repository {
    id: RepoId,
    name: RepositoryName,
}

impl Repository {
    /// Creates a repository identity.
    #[must_use]
    pub const fn new(id: RepoId, name: RepositoryName) -> Self {
        Self { id, name }
    }

    /// Returns the repository identifier.
    #[must_use]
    pub const fn id(&self) -> RepoId {
        self.id
    }

    /// Returns the repository name.
    #[must_use]
    pub const fn name(&self) -> &RepositoryName {
        &self.name
    }
}

/// The authenticated user performing an operation.
///
/// The engine trusts whatever identity the transport layer hands it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    id: UserId,
    username: String,
}

impl Actor {
    /// Creates an actor identity.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowDomainError::EmptyUsername`] when the username is
    /// empty after trimming.
    pub fn new(id: UserId, username: impl Into<String>) -> Result<Self, WorkflowDomainError> {
        let raw = username.into();
        let normalized = raw.trim();
        if normalized.is_empty() {
            return Err(WorkflowDomainError::EmptyUsername);
        }
        Ok(Self {
            id,
            username: normalized.to_owned(),
        })
    }

    /// Returns the user identifier.
    #[must_use]
    pub const fn id(&self) -> UserId {
        self.id
    }

    /// Returns the username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }
}
