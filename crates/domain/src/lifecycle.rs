use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Soft-deletion state carried by every persisted entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Lifecycle {
    /// Entity participates in lookups.
    Live,
    /// Entity is tombstoned and excluded from lookups.
    Deleted {
        /// Tombstone timestamp.
        deleted_at: DateTime<Utc>,
    },
}

impl Lifecycle {
    /// Rebuilds the lifecycle from a nullable tombstone column.
    #[must_use]
    pub fn from_deleted_at(deleted_at: Option<DateTime<Utc>>) -> Self {
        match deleted_at {
            Some(deleted_at) => Self::Deleted { deleted_at },
            None => Self::Live,
        }
    }

    /// Returns whether lookups may see the entity.
    #[must_use]
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live)
    }

    /// Returns the tombstone timestamp, if any.
    #[must_use]
    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Live => None,
            Self::Deleted { deleted_at } => Some(*deleted_at),
        }
    }
}
