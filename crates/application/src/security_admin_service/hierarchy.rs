use warden_domain::EffectiveRole;

use super::*;

impl SecurityAdminService {
    /// Moves a role (with its subtree) below `parent_name`, or to the root.
    pub async fn set_role_parent(
        &self,
        actor: &UserIdentity,
        role_name: &str,
        parent_name: Option<&str>,
    ) -> AppResult<()> {
        let role = self.require_role(&RoleName::new(role_name)?).await?;
        self.require_manage_permission(actor, role.org_id()).await?;

        let parent = match parent_name {
            Some(parent_name) => Some(self.require_role(&RoleName::new(parent_name)?).await?),
            None => None,
        };
        role.ensure_can_reparent(parent.as_ref())?;

        let plan = self
            .roles
            .set_role_parent(
                role.id(),
                parent.as_ref().map(Role::id),
                self.settings.max_hierarchy_depth(),
                self.clock.now(),
            )
            .await?;

        let parent_label = parent
            .as_ref()
            .map_or_else(|| "<root>".to_owned(), |parent| parent.name().to_string());

        self.append_audit(
            actor.subject(),
            role.org_id(),
            AuditAction::RoleReparented,
            "rbac_role",
            role.name().to_string(),
            format!(
                "moved role '{}' below '{parent_label}' ({} roles relevelled)",
                role.name(),
                plan.affected.len()
            ),
        )
        .await;

        Ok(())
    }

    /// Lists a role's ancestors nearest-first.
    pub async fn role_ancestors(
        &self,
        actor: &UserIdentity,
        role_name: &str,
    ) -> AppResult<Vec<EffectiveRole>> {
        let name = RoleName::new(role_name)?;
        let role = self.require_role(&name).await?;
        self.require_manage_permission(actor, role.org_id()).await?;
        self.hierarchy.ancestors(&name).await
    }

    /// Lists a role's descendants nearest-first.
    pub async fn role_descendants(
        &self,
        actor: &UserIdentity,
        role_name: &str,
    ) -> AppResult<Vec<EffectiveRole>> {
        let name = RoleName::new(role_name)?;
        let role = self.require_role(&name).await?;
        self.require_manage_permission(actor, role.org_id()).await?;
        self.hierarchy.descendants(&name).await
    }
}
