use async_trait::async_trait;
use chrono::{DateTime, Utc};
use warden_core::{AppResult, OrganizationId};
use warden_domain::{Membership, MembershipRole, Organization, OrganizationSlug, Role};

/// Rows written together when an organization is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizationProvisioning {
    /// New organization.
    pub organization: Organization,
    /// Creator's owner membership.
    pub owner: Membership,
    /// Tenant administrator role.
    pub admin_role: Role,
    /// When the creator was assigned the administrator role.
    pub assigned_at: DateTime<Utc>,
    /// Deepest level the administrator role may sit at.
    pub max_hierarchy_depth: usize,
}

/// Repository port for organizations and memberships.
#[async_trait]
pub trait OrganizationRepository: Send + Sync {
    /// Writes every row of the provisioning in one atomic unit.
    ///
    /// Fails with `DuplicateName` when the slug or the role name is taken.
    async fn create_organization(&self, provisioning: OrganizationProvisioning) -> AppResult<()>;

    /// Finds a visible organization.
    async fn find_organization(&self, org_id: OrganizationId) -> AppResult<Option<Organization>>;

    /// Finds a visible organization by slug.
    async fn find_organization_by_slug(
        &self,
        slug: &OrganizationSlug,
    ) -> AppResult<Option<Organization>>;

    /// Lists live memberships of an organization.
    async fn list_memberships(&self, org_id: OrganizationId) -> AppResult<Vec<Membership>>;

    /// Lists live memberships of a subject across organizations.
    async fn list_memberships_for_subject(&self, subject: &str) -> AppResult<Vec<Membership>>;

    /// Removes `target` on behalf of `actor`.
    ///
    /// Authority and sole-owner checks run in the same atomic unit as the write,
    /// which also revokes every assignment of `target` to a role of the tenant.
    async fn remove_membership(
        &self,
        org_id: OrganizationId,
        actor: &str,
        target: &str,
        removed_at: DateTime<Utc>,
    ) -> AppResult<Membership>;

    /// Changes the role of `target` on behalf of `actor`, guarded like removal.
    ///
    /// Promotion to owner assigns the tenant administrator role in the same
    /// atomic unit; demotion from owner revokes it.
    async fn update_membership_role(
        &self,
        org_id: OrganizationId,
        actor: &str,
        target: &str,
        role: MembershipRole,
        updated_at: DateTime<Utc>,
    ) -> AppResult<Membership>;

    /// Marks one membership as the subject's primary organization.
    async fn set_primary_organization(&self, subject: &str, org_id: OrganizationId)
    -> AppResult<()>;
}
