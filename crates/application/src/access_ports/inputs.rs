use serde_json::Value;
use warden_core::OrganizationId;
use warden_domain::{Membership, Organization, PlanTier};

/// Input payload for creating roles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateRoleInput {
    /// Unique role name.
    pub name: String,
    /// Human-friendly name.
    pub display_name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Initial active flag; defaults to active.
    pub is_active: Option<bool>,
    /// Optional parent role name.
    pub parent: Option<String>,
    /// Owning organization; `None` creates a global role.
    pub org_id: Option<OrganizationId>,
}

/// Input payload for creating contextual overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateContextualPermissionInput {
    /// Role the override attaches to.
    pub role_name: String,
    /// Resource term.
    pub resource: String,
    /// Action term.
    pub action: String,
    /// Optional (context type, context value) pair.
    pub context: Option<(String, String)>,
    /// Allow (`true`) or deny (`false`).
    pub is_granted: bool,
}

/// Input payload for creating organizations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateOrganizationInput {
    /// Unique slug.
    pub slug: String,
    /// Display name.
    pub name: String,
    /// Plan tier; defaults to free.
    pub plan_tier: Option<PlanTier>,
    /// Settings object.
    pub settings: Option<Value>,
}

/// Organization paired with the caller's membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizationMembershipView {
    /// Organization.
    pub organization: Organization,
    /// Caller's membership in it.
    pub membership: Membership,
}
