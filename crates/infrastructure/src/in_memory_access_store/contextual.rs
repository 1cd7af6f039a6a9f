use warden_application::ContextualPermissionRepository;
use warden_domain::{ContextualPermissionId, PermissionContext};

use super::*;

#[async_trait]
impl ContextualPermissionRepository for InMemoryAccessStore {
    async fn create_contextual_permission(
        &self,
        permission: ContextualPermission,
    ) -> AppResult<()> {
        let mut state = self.state.write().await;
        if state.live_role(permission.role_id()).is_none() {
            return Err(AppError::NotFound(format!(
                "role '{}' was not found",
                permission.role_id()
            )));
        }

        if state
            .contextual_permissions
            .iter()
            .any(|existing| existing.lifecycle().is_live() && existing.same_key(&permission))
        {
            return Err(AppError::DuplicateEntry(format!(
                "contextual permission '{}' on '{}' already exists for role '{}'",
                permission.action(),
                permission.resource(),
                permission.role_id()
            )));
        }

        state.contextual_permissions.push(permission);
        Ok(())
    }

    async fn find_contextual_permission(
        &self,
        id: ContextualPermissionId,
    ) -> AppResult<Option<ContextualPermission>> {
        let state = self.state.read().await;

        Ok(state
            .contextual_permissions
            .iter()
            .find(|permission| permission.id() == id && permission.lifecycle().is_live())
            .cloned())
    }

    async fn delete_contextual_permission(
        &self,
        id: ContextualPermissionId,
        deleted_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut state = self.state.write().await;
        let permission = state
            .contextual_permissions
            .iter_mut()
            .find(|permission| permission.id() == id && permission.lifecycle().is_live())
            .ok_or_else(|| {
                AppError::NotFound(format!("contextual permission '{id}' was not found"))
            })?;

        permission.mark_deleted(deleted_at);
        Ok(())
    }

    async fn list_for_roles(
        &self,
        role_ids: &[RoleId],
        context: Option<&PermissionContext>,
    ) -> AppResult<Vec<ContextualPermission>> {
        let state = self.state.read().await;

        Ok(state
            .contextual_permissions
            .iter()
            .filter(|permission| role_ids.contains(&permission.role_id()))
            .filter(|permission| permission.applies_to(context))
            .cloned()
            .collect())
    }
}
