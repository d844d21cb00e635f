//! Audit stamps and client-side recency ordering.

use super::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who performed a lifecycle action and when.
///
/// Closing and merging record their actor and timestamp together; an
/// `Option<AuditStamp>` keeps the pair from ever being half set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuditStamp {
    actor: UserId,
    at: DateTime<Utc>,
}

impl AuditStamp {
    /// Creates an audit stamp.
    #[must_use]
    pub const fn new(actor: UserId, at: DateTime<Utc>) -> Self {
        Self { actor, at }
    }

    /// Builds a stamp from nullable persisted columns.
    ///
    /// Returns `Ok(None)` when both columns are null and `Err(())` when only
    /// one of them is set.
    pub(crate) const fn from_columns(
        actor: Option<UserId>,
        at: Option<DateTime<Utc>>,
    ) -> Result<Option<Self>, ()> {
        match (actor, at) {
            (Some(actor_id), Some(timestamp)) => Ok(Some(Self::new(actor_id, timestamp))),
            (None, None) => Ok(None),
            _ => Err(()),
        }
    }

    /// Returns the acting user.
    #[must_use]
    pub const fn actor(&self) -> UserId {
        self.actor
    }

    /// Returns when the action happened.
    #[must_use]
    pub const fn at(&self) -> DateTime<Utc> {
        self.at
    }
}

/// Entities that carry a last-updated timestamp.
pub trait Timestamped {
    /// Returns when the entity was last mutated.
    fn updated_at(&self) -> DateTime<Utc>;
}

/// Re-sorts entities most recently updated first.
///
/// Stores return entities in creation order; presentation layers that list
/// by recent activity call this on the fetched page. The sort is stable, so
/// entities updated at the same instant keep their creation order.
pub fn sort_by_recent_activity<T: Timestamped>(items: &mut [T]) {
    items.sort_by(|left, right| right.updated_at().cmp(&left.updated_at()));
}
