mod audit;
mod contextual;
mod grants;
mod inputs;
mod invitations;
mod matcher;
mod organizations;
mod roles;
mod runtime;

pub use audit::{AuditEvent, AuditRepository};
pub use contextual::ContextualPermissionRepository;
pub use grants::{GrantRepository, RoleAssignment, RoleAssignmentRepository};
pub use inputs::{
    CreateContextualPermissionInput, CreateOrganizationInput, CreateRoleInput,
    OrganizationMembershipView,
};
pub use invitations::InvitationRepository;
pub use matcher::PolicyMatcher;
pub use organizations::{OrganizationProvisioning, OrganizationRepository};
pub use roles::{RoleDeletion, RoleRepository};
pub use runtime::{Clock, EmailService, SystemClock, TokenGenerator};
