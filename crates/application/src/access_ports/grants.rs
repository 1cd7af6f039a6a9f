use async_trait::async_trait;
use chrono::{DateTime, Utc};
use warden_core::AppResult;
use warden_domain::{PermissionGrant, RoleName};

/// Assignment projection mapping a subject to a role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleAssignment {
    /// Subject identifier.
    pub subject: String,
    /// Role name.
    pub role_name: RoleName,
    /// Assignment timestamp.
    pub assigned_at: DateTime<Utc>,
}

/// Repository port for (role, resource, action) policy facts.
#[async_trait]
pub trait GrantRepository: Send + Sync {
    /// Stores a grant; returns `false` when it already existed.
    async fn add_grant(&self, grant: &PermissionGrant) -> AppResult<bool>;

    /// Removes a grant; returns `false` when it did not exist.
    async fn remove_grant(&self, grant: &PermissionGrant) -> AppResult<bool>;

    /// Lists grants, optionally for one role.
    async fn list_grants(&self, role: Option<&RoleName>) -> AppResult<Vec<PermissionGrant>>;
}

/// Repository port for subject role assignments.
#[async_trait]
pub trait RoleAssignmentRepository: Send + Sync {
    /// Assigns a role; returns `false` when the assignment already existed.
    async fn assign_role(
        &self,
        subject: &str,
        role: &RoleName,
        assigned_at: DateTime<Utc>,
    ) -> AppResult<bool>;

    /// Removes an assignment; returns `false` when it did not exist.
    async fn revoke_role(&self, subject: &str, role: &RoleName) -> AppResult<bool>;

    /// Lists the roles directly assigned to a subject.
    async fn list_roles_for_subject(&self, subject: &str) -> AppResult<Vec<RoleName>>;

    /// Lists assignments, optionally for one role.
    async fn list_assignments(&self, role: Option<&RoleName>) -> AppResult<Vec<RoleAssignment>>;
}
