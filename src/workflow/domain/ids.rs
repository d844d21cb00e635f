//! Identifier types for the workflow domain.
//!
//! Identifiers are generated by the backing store (`BIGSERIAL` columns) or
//! supplied by external collaborators (repository and user identities), so
//! they wrap plain `i64` values rather than generating their own.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw identifier value.
            #[must_use]
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            /// Returns the underlying identifier value.
            #[must_use]
            pub const fn value(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

numeric_id!(
    /// Identifier of a version-controlled repository.
    RepoId
);

numeric_id!(
    /// Identifier of an issue, unique in combination with its [`RepoId`].
    IssueId
);

numeric_id!(
    /// Identifier of a merge request, unique in combination with its
    /// [`RepoId`].
    MergeRequestId
);

numeric_id!(
    /// Identifier of a user, as established by the authentication layer.
    UserId
);
