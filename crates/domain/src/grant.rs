use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use warden_core::{AppError, AppResult};

use crate::RoleName;

/// Full wildcard accepted for resources and actions.
pub const WILDCARD: &str = "*";

/// Resource or action term of a grant.
///
/// Only the full wildcard is supported; partial patterns such as `post*` are
/// rejected when the term is built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum PolicyTerm {
    /// Matches every value.
    Any,
    /// Matches one exact value.
    Exact(String),
}

impl PolicyTerm {
    /// Parses a term, trimming surrounding whitespace.
    pub fn parse(value: &str) -> AppResult<Self> {
        let trimmed = value.trim();

        if trimmed.is_empty() {
            return Err(AppError::Validation(
                "policy term must not be empty".to_owned(),
            ));
        }

        if trimmed == WILDCARD {
            return Ok(Self::Any);
        }

        if trimmed.contains('*') {
            return Err(AppError::Validation(format!(
                "partial wildcard '{trimmed}' is not supported"
            )));
        }

        Ok(Self::Exact(trimmed.to_owned()))
    }

    /// Returns whether the term covers the requested value.
    #[must_use]
    pub fn matches(&self, value: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(expected) => expected == value,
        }
    }

    /// Returns the storage value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Any => WILDCARD,
            Self::Exact(value) => value.as_str(),
        }
    }
}

impl Display for PolicyTerm {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl From<PolicyTerm> for String {
    fn from(value: PolicyTerm) -> Self {
        match value {
            PolicyTerm::Any => WILDCARD.to_owned(),
            PolicyTerm::Exact(value) => value,
        }
    }
}

impl TryFrom<String> for PolicyTerm {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value.as_str())
    }
}

/// Policy fact granting `action` on `resource` to every holder of `role`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PermissionGrant {
    role: RoleName,
    resource: PolicyTerm,
    action: PolicyTerm,
}

impl PermissionGrant {
    /// Creates a grant from already validated parts.
    #[must_use]
    pub fn new(role: RoleName, resource: PolicyTerm, action: PolicyTerm) -> Self {
        Self {
            role,
            resource,
            action,
        }
    }

    /// Parses a grant from raw storage values.
    pub fn parse(role: &str, resource: &str, action: &str) -> AppResult<Self> {
        Ok(Self::new(
            RoleName::new(role)?,
            PolicyTerm::parse(resource)?,
            PolicyTerm::parse(action)?,
        ))
    }

    /// Returns the granted role.
    #[must_use]
    pub fn role(&self) -> &RoleName {
        &self.role
    }

    /// Returns the resource term.
    #[must_use]
    pub fn resource(&self) -> &PolicyTerm {
        &self.resource
    }

    /// Returns the action term.
    #[must_use]
    pub fn action(&self) -> &PolicyTerm {
        &self.action
    }

    /// Returns whether this grant covers the request for its role.
    #[must_use]
    pub fn covers(&self, resource: &str, action: &str) -> bool {
        self.resource.matches(resource) && self.action.matches(action)
    }
}

#[cfg(test)]
mod tests {
    use super::{PermissionGrant, PolicyTerm};

    #[test]
    fn partial_wildcards_are_rejected() {
        assert!(PolicyTerm::parse("post*").is_err());
        assert!(PolicyTerm::parse("*:read").is_err());
        assert!(PolicyTerm::parse("").is_err());
        assert_eq!(PolicyTerm::parse(" * ").ok(), Some(PolicyTerm::Any));
    }

    #[test]
    fn wildcard_grant_covers_any_request() {
        let grant =
            PermissionGrant::parse("admin", "*", "*").unwrap_or_else(|_| unreachable!());
        assert!(grant.covers("posts", "delete"));
        assert!(grant.covers("billing", "read"));
    }

    #[test]
    fn exact_grant_requires_exact_match() {
        let grant =
            PermissionGrant::parse("editor", "posts", "*").unwrap_or_else(|_| unreachable!());
        assert!(grant.covers("posts", "publish"));
        assert!(!grant.covers("post", "publish"));
        assert!(!grant.covers("posts/1", "publish"));
    }
}
