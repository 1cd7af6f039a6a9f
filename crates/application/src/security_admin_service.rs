//! Administrative operations over roles, grants, assignments, the role
//! hierarchy and contextual overrides.
//!
//! Every operation acting on behalf of a caller is gated by
//! `rbac:manage` in the scope of the role it touches. Mutations update the
//! store first, then the policy matcher, then append an audit event.

use std::sync::Arc;

use tracing::{info, warn};
use warden_core::{AppError, AppResult, OrganizationId, UserIdentity};
use warden_domain::{AuditAction, Role, RoleName};

use crate::{
    AccessControlSettings, AuditEvent, AuditRepository, AuthorizationService, Clock,
    ContextualPermissionRepository, GrantRepository, PolicyMatcher, RoleAssignmentRepository,
    RoleHierarchyResolver, RoleRepository,
};

mod bootstrap;
mod contextual;
mod grants;
mod hierarchy;
mod roles;

/// Resource guarded by the administrative gate.
pub const RBAC_RESOURCE: &str = "rbac";

/// Action guarded by the administrative gate.
pub const RBAC_MANAGE_ACTION: &str = "manage";

/// Name of the built-in global administrator role.
pub const SYSTEM_ADMIN_ROLE: &str = "admin";

/// Subject recorded on audit events emitted by bootstrap operations.
pub const SYSTEM_SUBJECT: &str = "system";

/// Application service for RBAC administration workflows.
#[derive(Clone)]
pub struct SecurityAdminService {
    authorization_service: AuthorizationService,
    hierarchy: RoleHierarchyResolver,
    roles: Arc<dyn RoleRepository>,
    grants: Arc<dyn GrantRepository>,
    assignments: Arc<dyn RoleAssignmentRepository>,
    contextual_permissions: Arc<dyn ContextualPermissionRepository>,
    matcher: Arc<dyn PolicyMatcher>,
    audit_repository: Arc<dyn AuditRepository>,
    clock: Arc<dyn Clock>,
    settings: AccessControlSettings,
}

/// Repositories backing [`SecurityAdminService`].
#[derive(Clone)]
pub struct SecurityAdminRepositories {
    /// Role store.
    pub roles: Arc<dyn RoleRepository>,
    /// Grant store.
    pub grants: Arc<dyn GrantRepository>,
    /// Assignment store.
    pub assignments: Arc<dyn RoleAssignmentRepository>,
    /// Contextual override store.
    pub contextual_permissions: Arc<dyn ContextualPermissionRepository>,
    /// Audit trail.
    pub audit: Arc<dyn AuditRepository>,
}

impl SecurityAdminService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(
        authorization_service: AuthorizationService,
        hierarchy: RoleHierarchyResolver,
        repositories: SecurityAdminRepositories,
        matcher: Arc<dyn PolicyMatcher>,
        clock: Arc<dyn Clock>,
        settings: AccessControlSettings,
    ) -> Self {
        Self {
            authorization_service,
            hierarchy,
            roles: repositories.roles,
            grants: repositories.grants,
            assignments: repositories.assignments,
            contextual_permissions: repositories.contextual_permissions,
            matcher,
            audit_repository: repositories.audit,
            clock,
            settings,
        }
    }

    async fn require_manage_permission(
        &self,
        actor: &UserIdentity,
        org_id: Option<OrganizationId>,
    ) -> AppResult<()> {
        self.authorization_service
            .require_permission(actor.subject(), RBAC_RESOURCE, RBAC_MANAGE_ACTION, org_id)
            .await
    }

    async fn require_role(&self, role_name: &RoleName) -> AppResult<Role> {
        self.roles
            .find_role_by_name(role_name)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role '{role_name}' was not found")))
    }

    async fn append_audit(
        &self,
        subject: &str,
        org_id: Option<OrganizationId>,
        action: AuditAction,
        resource_type: &str,
        resource_id: String,
        detail: String,
    ) {
        info!(
            subject,
            org_id = ?org_id,
            action = action.as_str(),
            resource_id = %resource_id,
            "rbac change applied"
        );

        let appended = self
            .audit_repository
            .append_event(AuditEvent {
                org_id,
                subject: subject.to_owned(),
                action,
                resource_type: resource_type.to_owned(),
                resource_id,
                detail: Some(detail),
            })
            .await;

        // Audit failures after a committed change are logged, not returned.
        if let Err(error) = appended {
            warn!(error = %error, action = action.as_str(), "failed to append audit event");
        }
    }
}
