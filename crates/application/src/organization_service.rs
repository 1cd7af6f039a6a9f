//! Tenant lifecycle: organization provisioning, invitations and memberships.

use std::sync::Arc;

use tracing::{info, warn};
use warden_core::{AppError, AppResult, OrganizationId, UserIdentity};
use warden_domain::{
    AuditAction, EmailAddress, Membership, MembershipRole, MembershipRoster, Organization,
    OrganizationSlug, Role, RoleName,
};

use crate::{
    AccessControlSettings, AuditEvent, AuditRepository, Clock, CreateOrganizationInput,
    EmailService, InvitationRepository, OrganizationMembershipView, OrganizationProvisioning,
    OrganizationRepository, RoleRepository, SYSTEM_ADMIN_ROLE, TokenGenerator,
};

mod invitations;
mod members;

/// Application service for organizations, memberships and invitations.
#[derive(Clone)]
pub struct OrganizationService {
    organizations: Arc<dyn OrganizationRepository>,
    invitations: Arc<dyn InvitationRepository>,
    roles: Arc<dyn RoleRepository>,
    email_service: Arc<dyn EmailService>,
    token_generator: Arc<dyn TokenGenerator>,
    audit_repository: Arc<dyn AuditRepository>,
    clock: Arc<dyn Clock>,
    settings: AccessControlSettings,
}

/// Collaborators backing [`OrganizationService`].
#[derive(Clone)]
pub struct OrganizationServiceDependencies {
    /// Organization and membership store.
    pub organizations: Arc<dyn OrganizationRepository>,
    /// Invitation store.
    pub invitations: Arc<dyn InvitationRepository>,
    /// Role store, used to provision tenant administrator roles.
    pub roles: Arc<dyn RoleRepository>,
    /// Notification port for invitation links.
    pub email_service: Arc<dyn EmailService>,
    /// Invitation token source.
    pub token_generator: Arc<dyn TokenGenerator>,
    /// Audit trail.
    pub audit: Arc<dyn AuditRepository>,
    /// Time source.
    pub clock: Arc<dyn Clock>,
}

impl OrganizationService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(
        dependencies: OrganizationServiceDependencies,
        settings: AccessControlSettings,
    ) -> Self {
        Self {
            organizations: dependencies.organizations,
            invitations: dependencies.invitations,
            roles: dependencies.roles,
            email_service: dependencies.email_service,
            token_generator: dependencies.token_generator,
            audit_repository: dependencies.audit,
            clock: dependencies.clock,
            settings,
        }
    }

    /// Creates an organization owned by `actor`.
    ///
    /// The organization, the owner membership, the `<slug>:admin` role and the
    /// creator's assignment to it are written in one atomic unit.
    pub async fn create_organization(
        &self,
        actor: &UserIdentity,
        input: CreateOrganizationInput,
    ) -> AppResult<Organization> {
        let now = self.clock.now();
        let slug = OrganizationSlug::new(input.slug)?;

        let mut organization = Organization::new(slug.clone(), input.name, now)?;
        if let Some(plan_tier) = input.plan_tier {
            organization = organization.with_plan_tier(plan_tier);
        }
        if let Some(settings) = input.settings {
            organization = organization.with_settings(settings)?;
        }

        let email = actor.email().map(EmailAddress::new).transpose()?;
        let mut owner = Membership::new(
            organization.id(),
            actor.subject(),
            email,
            MembershipRole::Owner,
            now,
        )?;
        let existing = self
            .organizations
            .list_memberships_for_subject(actor.subject())
            .await?;
        if !existing.iter().any(Membership::is_primary) {
            owner = owner.primary();
        }

        let mut admin_role = Role::new(
            slug.admin_role_name()?,
            format!("{} administrators", organization.name()),
            now,
        )?
        .scoped_to(organization.id());
        if let Some(global_admin) = self
            .roles
            .find_role_by_name(&RoleName::new(SYSTEM_ADMIN_ROLE)?)
            .await?
        {
            admin_role = admin_role.with_parent(&global_admin)?;
        }

        self.organizations
            .create_organization(OrganizationProvisioning {
                organization: organization.clone(),
                owner,
                admin_role: admin_role.clone(),
                assigned_at: now,
                max_hierarchy_depth: self.settings.max_hierarchy_depth(),
            })
            .await?;

        self.append_audit(
            actor.subject(),
            organization.id(),
            AuditAction::OrganizationCreated,
            "organization",
            organization.id().to_string(),
            format!(
                "created organization '{}' with administrator role '{}'",
                organization.slug(),
                admin_role.name()
            ),
        )
        .await;

        Ok(organization)
    }

    /// Lists the caller's organizations with their memberships.
    pub async fn list_organizations_for_subject(
        &self,
        actor: &UserIdentity,
    ) -> AppResult<Vec<OrganizationMembershipView>> {
        let memberships = self
            .organizations
            .list_memberships_for_subject(actor.subject())
            .await?;

        let mut views = Vec::with_capacity(memberships.len());
        for membership in memberships {
            if let Some(organization) = self
                .organizations
                .find_organization(membership.org_id())
                .await?
            {
                views.push(OrganizationMembershipView {
                    organization,
                    membership,
                });
            }
        }

        Ok(views)
    }

    /// Marks one of the caller's memberships as primary.
    pub async fn set_primary_organization(
        &self,
        actor: &UserIdentity,
        org_id: OrganizationId,
    ) -> AppResult<()> {
        self.organizations
            .set_primary_organization(actor.subject(), org_id)
            .await
    }

    async fn require_organization(&self, org_id: OrganizationId) -> AppResult<Organization> {
        self.organizations
            .find_organization(org_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("organization '{org_id}' was not found")))
    }

    async fn require_member_manager(
        &self,
        actor: &UserIdentity,
        org_id: OrganizationId,
    ) -> AppResult<()> {
        let members = self.organizations.list_memberships(org_id).await?;
        let roster = MembershipRoster::new(&members);
        let Some(member) = roster.member(actor.subject()) else {
            return Err(AppError::PermissionDenied(format!(
                "subject '{}' is not a member of organization '{org_id}'",
                actor.subject()
            )));
        };

        if !member.role().can_manage_members() {
            return Err(AppError::PermissionDenied(format!(
                "subject '{}' cannot manage members of organization '{org_id}'",
                actor.subject()
            )));
        }

        Ok(())
    }

    async fn append_audit(
        &self,
        subject: &str,
        org_id: OrganizationId,
        action: AuditAction,
        resource_type: &str,
        resource_id: String,
        detail: String,
    ) {
        info!(
            subject,
            org_id = %org_id,
            action = action.as_str(),
            resource_id = %resource_id,
            "organization change applied"
        );

        let appended = self
            .audit_repository
            .append_event(AuditEvent {
                org_id: Some(org_id),
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
