//! Branch name value object for merge requests.

use super::WorkflowDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length for a validated branch name, matching the
/// `VARCHAR(255)` branch columns.
const MAX_BRANCH_NAME_LENGTH: usize = 255;

/// Characters `git check-ref-format` refuses anywhere in a ref name.
const FORBIDDEN_CHARACTERS: [char; 7] = [':', '~', '^', '?', '*', '[', '\\'];

/// Validated Git branch name.
///
/// Applies the subset of `git check-ref-format --branch` rules that matter
/// for passing a name safely to `git checkout` and `git merge`: no
/// whitespace, control characters or ref-syntax metacharacters, no `..` or
/// `@{` sequences, no empty path components, and no leading `-` that would
/// be read as a command-line option.
///
/// # Examples
///
///     use trellis::workflow::domain::BranchName;
///
///     let name = BranchName::new("feature/my-branch").expect("valid");
///     assert_eq!(name.ref_name(), "refs/heads/feature/my-branch");
///     assert!(BranchName::new("--force").is_err());
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchName(String);

impl BranchName {
    /// Creates a validated branch name.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowDomainError::InvalidBranchName`] when the value is
    /// not an acceptable Git branch name.
    pub fn new(value: impl Into<String>) -> Result<Self, WorkflowDomainError> {
        let raw = value.into();
        let normalized = raw.trim();

        if Self::is_invalid_branch_name(normalized) {
            return Err(WorkflowDomainError::InvalidBranchName(raw));
        }

        Ok(Self(normalized.to_owned()))
    }

    fn is_invalid_branch_name(name: &str) -> bool {
        let is_empty = name.is_empty();
        let exceeds_length_limit = name.len() > MAX_BRANCH_NAME_LENGTH;
        let has_forbidden_char = name.chars().any(|ch| {
            ch.is_control() || ch.is_whitespace() || FORBIDDEN_CHARACTERS.contains(&ch)
        });
        let has_forbidden_sequence =
            name.contains("..") || name.contains("@{") || name.contains("//");
        let has_bad_boundary = name.starts_with('-')
            || name.starts_with('/')
            || name.ends_with('/')
            || name.ends_with('.')
            || name.ends_with(".lock");
        let has_hidden_component = name.split('/').any(|component| component.starts_with('.'));

        is_empty
            || exceeds_length_limit
            || has_forbidden_char
            || has_forbidden_sequence
            || has_bad_boundary
            || has_hidden_component
            || name == "@"
    }

    /// Returns the branch name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the fully qualified ref, `refs/heads/<name>`.
    #[must_use]
    pub fn ref_name(&self) -> String {
        format!("refs/heads/{}", self.0)
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
