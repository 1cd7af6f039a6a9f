use async_trait::async_trait;
use warden_core::AppResult;
use warden_domain::{PermissionGrant, RoleName};

/// Decision engine over (role, resource, action) grants.
///
/// Mutations must be visible to the next `has_permission` call once they
/// return.
#[async_trait]
pub trait PolicyMatcher: Send + Sync {
    /// Returns whether any of `roles` holds a grant covering the request.
    async fn has_permission(
        &self,
        roles: &[RoleName],
        resource: &str,
        action: &str,
    ) -> AppResult<bool>;

    /// Adds a grant; adding an existing grant is a no-op.
    async fn add_grant(&self, grant: &PermissionGrant) -> AppResult<()>;

    /// Removes a grant; removing a missing grant is a no-op.
    async fn remove_grant(&self, grant: &PermissionGrant) -> AppResult<()>;

    /// Replaces every cached grant.
    async fn replace_grants(&self, grants: Vec<PermissionGrant>) -> AppResult<()>;
}
