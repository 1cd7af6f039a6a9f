use warden_domain::{
    ContextualPermission, ContextualPermissionId, PermissionContext, PolicyTerm,
};

use super::*;
use crate::CreateContextualPermissionInput;

impl SecurityAdminService {
    /// Creates an allow or deny override for a role.
    pub async fn create_contextual_permission(
        &self,
        actor: &UserIdentity,
        input: CreateContextualPermissionInput,
    ) -> AppResult<ContextualPermission> {
        let role = self.require_role(&RoleName::new(input.role_name)?).await?;
        self.require_manage_permission(actor, role.org_id()).await?;

        let context = input
            .context
            .map(|(context_type, context_value)| {
                PermissionContext::new(&context_type, &context_value)
            })
            .transpose()?;

        let permission = ContextualPermission::new(
            role.id(),
            PolicyTerm::parse(&input.resource)?,
            PolicyTerm::parse(&input.action)?,
            context,
            input.is_granted,
            self.clock.now(),
        );

        self.contextual_permissions
            .create_contextual_permission(permission.clone())
            .await?;

        let scope = permission.context().map_or_else(
            || "any context".to_owned(),
            |context| format!("{}={}", context.context_type(), context.context_value()),
        );
        let effect = if permission.is_granted() { "allow" } else { "deny" };

        self.append_audit(
            actor.subject(),
            role.org_id(),
            AuditAction::ContextualPermissionCreated,
            "rbac_contextual_permission",
            permission.id().to_string(),
            format!(
                "{effect} '{}' on '{}' for role '{}' in {scope}",
                permission.action(),
                permission.resource(),
                role.name()
            ),
        )
        .await;

        Ok(permission)
    }

    /// Tombstones a contextual override.
    pub async fn delete_contextual_permission(
        &self,
        actor: &UserIdentity,
        id: ContextualPermissionId,
    ) -> AppResult<()> {
        let permission = self
            .contextual_permissions
            .find_contextual_permission(id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("contextual permission '{id}' was not found"))
            })?;

        let org_id = self
            .roles
            .find_role(permission.role_id())
            .await?
            .and_then(|role| role.org_id());
        self.require_manage_permission(actor, org_id).await?;

        self.contextual_permissions
            .delete_contextual_permission(id, self.clock.now())
            .await?;

        self.append_audit(
            actor.subject(),
            org_id,
            AuditAction::ContextualPermissionDeleted,
            "rbac_contextual_permission",
            id.to_string(),
            format!(
                "deleted override '{}' on '{}'",
                permission.action(),
                permission.resource()
            ),
        )
        .await;

        Ok(())
    }
}
