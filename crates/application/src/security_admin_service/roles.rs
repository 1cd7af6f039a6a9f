use warden_domain::{RoleId, RoleUpdate};

use super::*;
use crate::CreateRoleInput;

impl SecurityAdminService {
    /// Lists visible roles; with `org_id` only global roles and that tenant's.
    pub async fn list_roles(
        &self,
        actor: &UserIdentity,
        org_id: Option<OrganizationId>,
    ) -> AppResult<Vec<Role>> {
        self.require_manage_permission(actor, org_id).await?;
        self.roles.list_roles(org_id).await
    }

    /// Returns one visible role.
    pub async fn get_role(&self, actor: &UserIdentity, role_id: RoleId) -> AppResult<Role> {
        let role = self
            .roles
            .find_role(role_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' was not found")))?;

        self.require_manage_permission(actor, role.org_id()).await?;
        Ok(role)
    }

    /// Creates a role, optionally below a parent, and emits an audit event.
    pub async fn create_role(
        &self,
        actor: &UserIdentity,
        input: CreateRoleInput,
    ) -> AppResult<Role> {
        self.require_manage_permission(actor, input.org_id).await?;

        let name = RoleName::new(input.name)?;
        if name.is_tenant_admin() {
            return Err(AppError::Validation(format!(
                "role name '{name}' is reserved for organization administrators"
            )));
        }

        let mut role = Role::new(name, input.display_name, self.clock.now())?
            .with_description(input.description)
            .with_active(input.is_active.unwrap_or(true));

        if let Some(org_id) = input.org_id {
            role = role.scoped_to(org_id);
        }

        if let Some(parent_name) = input.parent {
            let parent = self.require_role(&RoleName::new(parent_name)?).await?;
            role = role.with_parent(&parent)?;
        }

        let role = self
            .roles
            .create_role(role, self.settings.max_hierarchy_depth())
            .await?;

        self.append_audit(
            actor.subject(),
            role.org_id(),
            AuditAction::RoleCreated,
            "rbac_role",
            role.name().to_string(),
            format!("created role '{}'", role.name()),
        )
        .await;

        Ok(role)
    }

    /// Updates display name, description or active flag of a custom role.
    pub async fn update_role(
        &self,
        actor: &UserIdentity,
        role_id: RoleId,
        update: RoleUpdate,
    ) -> AppResult<Role> {
        let mut role = self
            .roles
            .find_role(role_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' was not found")))?;

        self.require_manage_permission(actor, role.org_id()).await?;

        role.apply_update(update, self.clock.now())?;
        self.roles.save_role(&role).await?;

        self.append_audit(
            actor.subject(),
            role.org_id(),
            AuditAction::RoleUpdated,
            "rbac_role",
            role.name().to_string(),
            format!(
                "updated role '{}' (active: {})",
                role.name(),
                role.is_active()
            ),
        )
        .await;

        Ok(role)
    }

    /// Tombstones a custom role.
    ///
    /// Grants, assignments and contextual permissions cascade; children are
    /// re-pointed to the deleted role's parent.
    pub async fn delete_role(&self, actor: &UserIdentity, role_name: &str) -> AppResult<()> {
        let role = self.require_role(&RoleName::new(role_name)?).await?;
        self.require_manage_permission(actor, role.org_id()).await?;
        role.ensure_mutable()?;

        let deletion = self.roles.delete_role(role.id(), self.clock.now()).await?;
        for grant in &deletion.removed_grants {
            self.matcher.remove_grant(grant).await?;
        }

        self.append_audit(
            actor.subject(),
            role.org_id(),
            AuditAction::RoleDeleted,
            "rbac_role",
            role.name().to_string(),
            format!(
                "deleted role '{}' ({} grants, {} assignments, {} contextual permissions, {} children re-pointed)",
                role.name(),
                deletion.removed_grants.len(),
                deletion.removed_assignments,
                deletion.removed_contextual_permissions,
                deletion.hierarchy.parent_changes.len()
            ),
        )
        .await;

        Ok(())
    }
}
