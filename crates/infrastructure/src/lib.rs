//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod console_email_service;
mod in_memory_access_store;
mod in_memory_audit_repository;
mod in_memory_policy_matcher;
mod postgres_audit_repository;
mod postgres_contextual_permission_repository;
mod postgres_grant_repository;
mod postgres_invitation_repository;
mod postgres_organization_repository;
mod postgres_role_repository;
mod postgres_support;
mod smtp_email_service;

#[cfg(test)]
mod postgres_test_support;

pub use console_email_service::ConsoleEmailService;
pub use in_memory_access_store::InMemoryAccessStore;
pub use in_memory_audit_repository::InMemoryAuditRepository;
pub use in_memory_policy_matcher::InMemoryPolicyMatcher;
pub use postgres_audit_repository::PostgresAuditRepository;
pub use postgres_contextual_permission_repository::PostgresContextualPermissionRepository;
pub use postgres_grant_repository::PostgresGrantRepository;
pub use postgres_invitation_repository::PostgresInvitationRepository;
pub use postgres_organization_repository::PostgresOrganizationRepository;
pub use postgres_role_repository::PostgresRoleRepository;
pub use smtp_email_service::{SmtpEmailConfig, SmtpEmailService};
