//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod audit;
mod contextual;
mod email;
mod grant;
mod hierarchy;
mod invitation;
mod lifecycle;
mod organization;
mod role;

pub use audit::AuditAction;
pub use contextual::{
    ContextualEffect, ContextualPermission, ContextualPermissionId, ORGANIZATION_CONTEXT,
    PermissionContext, resolve_contextual_permissions,
};
pub use email::{EMAIL_MAX_LENGTH, EmailAddress};
pub use grant::{PermissionGrant, PolicyTerm, WILDCARD};
pub use hierarchy::{
    AncestorWalk, DEFAULT_MAX_HIERARCHY_DEPTH, EffectiveRole, HierarchyEdge, HierarchyPlan,
    HierarchySnapshot,
};
pub use invitation::{DEFAULT_INVITATION_TTL_HOURS, Invitation, InvitationId, InvitationState};
pub use lifecycle::Lifecycle;
pub use organization::{
    Membership, MembershipRole, MembershipRoster, Organization, OrganizationSlug, PlanTier,
    SLUG_MAX_LENGTH, SLUG_MIN_LENGTH,
};
pub use role::{
    ROLE_NAME_MAX_LENGTH, Role, RoleId, RoleName, RoleParts, RoleUpdate, TENANT_ADMIN_ROLE_SUFFIX,
};
