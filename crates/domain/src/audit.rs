use std::str::FromStr;

use serde::{Deserialize, Serialize};
use warden_core::AppError;

/// Stable audit actions emitted by administrative use-cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Emitted when a role is created.
    RoleCreated,
    /// Emitted when role attributes change.
    RoleUpdated,
    /// Emitted when a role is tombstoned.
    RoleDeleted,
    /// Emitted when a role moves in the hierarchy.
    RoleReparented,
    /// Emitted when a grant is added to a role.
    PermissionGranted,
    /// Emitted when a grant is removed from a role.
    PermissionRevoked,
    /// Emitted when a role is assigned to a subject.
    RoleAssigned,
    /// Emitted when a role is removed from a subject.
    RoleUnassigned,
    /// Emitted when a contextual override is created.
    ContextualPermissionCreated,
    /// Emitted when a contextual override is removed.
    ContextualPermissionDeleted,
    /// Emitted when an organization is provisioned.
    OrganizationCreated,
    /// Emitted when an invitation is issued.
    InvitationCreated,
    /// Emitted when an invitation is accepted.
    InvitationAccepted,
    /// Emitted when an invitation is withdrawn.
    InvitationRevoked,
    /// Emitted when a member leaves or is removed.
    MemberRemoved,
    /// Emitted when a member's role changes.
    MemberRoleChanged,
}

impl AuditAction {
    /// Every action, in declaration order.
    pub const ALL: [Self; 16] = [
        Self::RoleCreated,
        Self::RoleUpdated,
        Self::RoleDeleted,
        Self::RoleReparented,
        Self::PermissionGranted,
        Self::PermissionRevoked,
        Self::RoleAssigned,
        Self::RoleUnassigned,
        Self::ContextualPermissionCreated,
        Self::ContextualPermissionDeleted,
        Self::OrganizationCreated,
        Self::InvitationCreated,
        Self::InvitationAccepted,
        Self::InvitationRevoked,
        Self::MemberRemoved,
        Self::MemberRoleChanged,
    ];

    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoleCreated => "rbac.role.created",
            Self::RoleUpdated => "rbac.role.updated",
            Self::RoleDeleted => "rbac.role.deleted",
            Self::RoleReparented => "rbac.role.reparented",
            Self::PermissionGranted => "rbac.permission.granted",
            Self::PermissionRevoked => "rbac.permission.revoked",
            Self::RoleAssigned => "rbac.role.assigned",
            Self::RoleUnassigned => "rbac.role.unassigned",
            Self::ContextualPermissionCreated => "rbac.contextual_permission.created",
            Self::ContextualPermissionDeleted => "rbac.contextual_permission.deleted",
            Self::OrganizationCreated => "org.created",
            Self::InvitationCreated => "org.invitation.created",
            Self::InvitationAccepted => "org.invitation.accepted",
            Self::InvitationRevoked => "org.invitation.revoked",
            Self::MemberRemoved => "org.member.removed",
            Self::MemberRoleChanged => "org.member.role_changed",
        }
    }
}

impl FromStr for AuditAction {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == value)
            .ok_or_else(|| AppError::Validation(format!("unknown audit action '{value}'")))
    }
}
