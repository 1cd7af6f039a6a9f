//! Application services and ports.

#![forbid(unsafe_code)]

mod access_ports;
mod authorization_service;
mod contextual_permission_service;
mod organization_service;
mod role_hierarchy_service;
mod security_admin_service;
mod settings;
mod token_crypto;

#[cfg(test)]
mod test_support;

pub use access_ports::{
    AuditEvent, AuditRepository, Clock, ContextualPermissionRepository,
    CreateContextualPermissionInput, CreateOrganizationInput, CreateRoleInput, EmailService,
    GrantRepository, InvitationRepository, OrganizationMembershipView, OrganizationProvisioning,
    OrganizationRepository, PolicyMatcher, RoleAssignment, RoleAssignmentRepository, RoleDeletion,
    RoleRepository, SystemClock, TokenGenerator,
};
pub use authorization_service::{AccessDecision, AuthorizationService, DecisionSource};
pub use contextual_permission_service::ContextualPermissionResolver;
pub use organization_service::{OrganizationService, OrganizationServiceDependencies};
pub use role_hierarchy_service::RoleHierarchyResolver;
pub use security_admin_service::{
    RBAC_MANAGE_ACTION, RBAC_RESOURCE, SYSTEM_ADMIN_ROLE, SYSTEM_SUBJECT,
    SecurityAdminRepositories, SecurityAdminService,
};
pub use settings::{AccessControlSettings, MAX_HIERARCHY_DEPTH_LIMIT};
pub use token_crypto::{RandomTokenGenerator, hash_token};
