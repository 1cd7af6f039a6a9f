//! Shared primitives for all Rust crates in Warden.

#![forbid(unsafe_code)]

/// Authentication primitives shared across services.
pub mod auth;

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use auth::UserIdentity;

/// Result type used across Warden crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

/// Organization (tenant) identifier used to scope roles, memberships and checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrganizationId(Uuid);

impl OrganizationId {
    /// Creates a random organization identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an organization identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for OrganizationId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for OrganizationId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Coarse error taxonomy the surrounding service maps onto its responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Malformed input.
    Validation,
    /// Referenced role, permission, invitation or organization is absent.
    NotFound,
    /// Write collides with existing state.
    Conflict,
    /// Operation is not allowed in the entity's current state.
    InvalidState,
    /// Operation would break the role hierarchy shape.
    StructuralViolation,
    /// Caller lacks the rights for an administrative action.
    PermissionDenied,
    /// Storage or runtime failure.
    Internal,
}

/// Common application errors.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// No invitation matches the presented token.
    #[error("invalid invitation token")]
    InvalidToken,

    /// A live role or organization already uses the name.
    #[error("duplicate name: {0}")]
    DuplicateName(String),

    /// An identical live entry already exists.
    #[error("duplicate entry: {0}")]
    DuplicateEntry(String),

    /// The subject or email already belongs to the organization.
    #[error("already a member: {0}")]
    AlreadyMember(String),

    /// An unexpired, unaccepted invitation exists for the email.
    #[error("invitation already pending: {0}")]
    InvitationAlreadyPending(String),

    /// System roles cannot be deleted or edited.
    #[error("system role '{0}' is immutable")]
    SystemRoleImmutable(String),

    /// Inactive roles cannot be assigned or granted permissions.
    #[error("role '{0}' is inactive")]
    RoleInactive(String),

    /// The invitation expiry timestamp has passed.
    #[error("invitation has expired")]
    InvitationExpired,

    /// The invitation has already been accepted.
    #[error("invitation has already been accepted")]
    InvitationAlreadyAccepted,

    /// Removing or demoting the member would leave the organization without an owner.
    #[error("cannot remove sole owner: {0}")]
    SoleOwner(String),

    /// The requested parent link would introduce a cycle.
    #[error("cyclic role hierarchy: {0}")]
    CyclicHierarchy(String),

    /// The role hierarchy would exceed the configured maximum depth.
    #[error("role hierarchy exceeds maximum depth of {max_depth}")]
    HierarchyTooDeep {
        /// Configured maximum number of ancestors.
        max_depth: usize,
    },

    /// Caller lacks the rights for an administrative action.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the taxonomy bucket for this error.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) => ErrorCategory::Validation,
            Self::NotFound(_) | Self::InvalidToken => ErrorCategory::NotFound,
            Self::DuplicateName(_)
            | Self::DuplicateEntry(_)
            | Self::AlreadyMember(_)
            | Self::InvitationAlreadyPending(_) => ErrorCategory::Conflict,
            Self::SystemRoleImmutable(_)
            | Self::RoleInactive(_)
            | Self::InvitationExpired
            | Self::InvitationAlreadyAccepted
            | Self::SoleOwner(_) => ErrorCategory::InvalidState,
            Self::CyclicHierarchy(_) | Self::HierarchyTooDeep { .. } => {
                ErrorCategory::StructuralViolation
            }
            Self::PermissionDenied(_) => ErrorCategory::PermissionDenied,
            Self::Internal(_) => ErrorCategory::Internal,
        }
    }
}
