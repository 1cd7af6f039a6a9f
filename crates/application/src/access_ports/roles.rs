use async_trait::async_trait;
use chrono::{DateTime, Utc};
use warden_core::{AppResult, OrganizationId};
use warden_domain::{EffectiveRole, HierarchyPlan, PermissionGrant, Role, RoleId, RoleName};

/// Rows removed or rewritten by a role deletion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleDeletion {
    /// Grants that were attached to the deleted role.
    pub removed_grants: Vec<PermissionGrant>,
    /// Number of subject assignments removed.
    pub removed_assignments: u64,
    /// Number of contextual permissions tombstoned.
    pub removed_contextual_permissions: u64,
    /// Hierarchy changes applied to the deleted role's descendants.
    pub hierarchy: HierarchyPlan,
}

/// Repository port for roles and their materialized hierarchy.
///
/// Lookups only return roles for which [`Role::is_visible`] holds.
#[async_trait]
pub trait RoleRepository: Send + Sync {
    /// Persists a new role together with its closure rows and returns it.
    ///
    /// The parent is reread inside the same atomic unit; the stored level
    /// derives from it and must not exceed `max_depth`. Fails with
    /// `DuplicateName` when a live role already uses the name.
    async fn create_role(&self, role: Role, max_depth: usize) -> AppResult<Role>;

    /// Persists attribute changes of an existing role.
    async fn save_role(&self, role: &Role) -> AppResult<()>;

    /// Finds a visible role by identifier.
    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<Role>>;

    /// Finds a visible role by name.
    async fn find_role_by_name(&self, name: &RoleName) -> AppResult<Option<Role>>;

    /// Lists visible roles; with `org_id` only global roles and that tenant's roles.
    async fn list_roles(&self, org_id: Option<OrganizationId>) -> AppResult<Vec<Role>>;

    /// Tombstones a role in one atomic unit: grants, assignments and
    /// contextual permissions cascade and children move to its parent.
    async fn delete_role(&self, role_id: RoleId, deleted_at: DateTime<Utc>)
    -> AppResult<RoleDeletion>;

    /// Moves a role below `parent_role_id`, serialized against other moves.
    ///
    /// Cycle and depth validation run inside the same atomic unit as the write.
    async fn set_role_parent(
        &self,
        role_id: RoleId,
        parent_role_id: Option<RoleId>,
        max_depth: usize,
        updated_at: DateTime<Utc>,
    ) -> AppResult<HierarchyPlan>;

    /// Lists ancestors nearest-first from the materialized closure.
    async fn list_ancestors(&self, role_id: RoleId) -> AppResult<Vec<EffectiveRole>>;

    /// Lists descendants nearest-first from the materialized closure.
    async fn list_descendants(&self, role_id: RoleId) -> AppResult<Vec<EffectiveRole>>;
}
