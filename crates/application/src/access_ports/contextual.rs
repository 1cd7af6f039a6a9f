use async_trait::async_trait;
use chrono::{DateTime, Utc};
use warden_core::AppResult;
use warden_domain::{ContextualPermission, ContextualPermissionId, PermissionContext, RoleId};

/// Repository port for contextual allow/deny overrides.
#[async_trait]
pub trait ContextualPermissionRepository: Send + Sync {
    /// Stores a live override.
    ///
    /// Fails with `DuplicateEntry` when a live override has the same
    /// (role, resource, action, context) key.
    async fn create_contextual_permission(&self, permission: ContextualPermission)
    -> AppResult<()>;

    /// Finds a live override.
    async fn find_contextual_permission(
        &self,
        id: ContextualPermissionId,
    ) -> AppResult<Option<ContextualPermission>>;

    /// Tombstones a live override.
    async fn delete_contextual_permission(
        &self,
        id: ContextualPermissionId,
        deleted_at: DateTime<Utc>,
    ) -> AppResult<()>;

    /// Lists live overrides of the given roles whose context is absent or
    /// equal to `context`.
    async fn list_for_roles(
        &self,
        role_ids: &[RoleId],
        context: Option<&PermissionContext>,
    ) -> AppResult<Vec<ContextualPermission>>;
}
