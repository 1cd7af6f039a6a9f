use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::Mutex;

use warden_core::{AppError, AppResult, OrganizationId, UserIdentity};
use warden_domain::{
    ContextualPermission, ContextualPermissionId, EffectiveRole, HierarchyPlan,
    HierarchySnapshot, Invitation, InvitationId, Membership, MembershipRole, MembershipRoster,
    Organization, OrganizationSlug, PermissionContext, PermissionGrant, Role, RoleId, RoleName,
};

use crate::{
    AccessControlSettings, AuditEvent, AuditRepository, AuthorizationService, Clock,
    ContextualPermissionRepository, ContextualPermissionResolver, EmailService, GrantRepository,
    InvitationRepository, OrganizationProvisioning, OrganizationRepository,
    OrganizationService, OrganizationServiceDependencies, PolicyMatcher, RoleAssignment,
    RoleAssignmentRepository, RoleDeletion, RoleHierarchyResolver, RoleRepository,
    SecurityAdminRepositories, SecurityAdminService, TokenGenerator,
};

#[derive(Default)]
pub(crate) struct FakeState {
    pub(crate) roles: Vec<Role>,
    pub(crate) grants: BTreeSet<PermissionGrant>,
    pub(crate) assignments: Vec<RoleAssignment>,
    pub(crate) contextual: Vec<ContextualPermission>,
    pub(crate) organizations: Vec<Organization>,
    pub(crate) memberships: Vec<Membership>,
    pub(crate) invitations: Vec<Invitation>,
}

impl FakeState {
    fn sync_tenant_admin(
        &mut self,
        org_id: OrganizationId,
        subject: &str,
        role: MembershipRole,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        let name = self
            .organizations
            .iter()
            .find(|organization| organization.id() == org_id)
            .ok_or_else(|| AppError::NotFound(org_id.to_string()))?
            .slug()
            .admin_role_name()?;

        self.assignments
            .retain(|item| !(item.subject == subject && item.role_name == name));
        if role.holds_tenant_admin_role() {
            self.assignments.push(RoleAssignment {
                subject: subject.to_owned(),
                role_name: name,
                assigned_at: at,
            });
        }
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeAccessStore {
    pub(crate) state: Mutex<FakeState>,
}

fn apply_plan(roles: &mut [Role], plan: &HierarchyPlan, at: DateTime<Utc>) {
    for role in roles.iter_mut() {
        if let Some((_, parent)) = plan
            .parent_changes
            .iter()
            .find(|(role_id, _)| *role_id == role.id())
        {
            let level = plan
                .levels
                .iter()
                .find(|(role_id, _)| *role_id == role.id())
                .map_or(0, |(_, level)| *level);
            role.adopt_parent(*parent, level, at);
        } else if let Some((_, level)) = plan
            .levels
            .iter()
            .find(|(role_id, _)| *role_id == role.id())
        {
            role.set_hierarchy_level(*level);
        }
    }
}

fn to_effective(roles: &[Role], entries: Vec<(RoleId, u32)>) -> Vec<EffectiveRole> {
    entries
        .into_iter()
        .filter_map(|(role_id, distance)| {
            roles
                .iter()
                .find(|role| role.is_visible() && role.id() == role_id)
                .map(|role| EffectiveRole {
                    role: role.clone(),
                    distance,
                })
        })
        .collect()
}

#[async_trait]
impl RoleRepository for FakeAccessStore {
    async fn create_role(&self, role: Role, max_depth: usize) -> AppResult<Role> {
        let mut state = self.state.lock().await;
        if state
            .roles
            .iter()
            .any(|existing| existing.is_visible() && existing.name() == role.name())
        {
            return Err(AppError::DuplicateName(role.name().to_string()));
        }

        let role = match role.parent_role_id() {
            Some(parent_id) => {
                let parent = state
                    .roles
                    .iter()
                    .find(|parent| parent.is_visible() && parent.id() == parent_id)
                    .ok_or_else(|| AppError::NotFound(parent_id.to_string()))?;
                role.with_parent(parent)?
            }
            None => role,
        };
        role.ensure_depth_within(max_depth)?;

        state.roles.push(role.clone());
        Ok(role)
    }

    async fn save_role(&self, role: &Role) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state.roles.iter_mut().find(|item| item.id() == role.id()) {
            *existing = role.clone();
        }
        Ok(())
    }

    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<Role>> {
        let state = self.state.lock().await;
        Ok(state
            .roles
            .iter()
            .find(|role| role.is_visible() && role.id() == role_id)
            .cloned())
    }

    async fn find_role_by_name(&self, name: &RoleName) -> AppResult<Option<Role>> {
        let state = self.state.lock().await;
        Ok(state
            .roles
            .iter()
            .find(|role| role.is_visible() && role.name() == name)
            .cloned())
    }

    async fn list_roles(&self, org_id: Option<OrganizationId>) -> AppResult<Vec<Role>> {
        let state = self.state.lock().await;
        Ok(state
            .roles
            .iter()
            .filter(|role| role.is_visible() && (org_id.is_none() || role.applies_in(org_id)))
            .cloned()
            .collect())
    }

    async fn delete_role(
        &self,
        role_id: RoleId,
        deleted_at: DateTime<Utc>,
    ) -> AppResult<RoleDeletion> {
        let mut state = self.state.lock().await;
        let snapshot = HierarchySnapshot::from_roles(&state.roles);
        let plan = snapshot.plan_removal(role_id)?;

        let role = state
            .roles
            .iter_mut()
            .find(|role| role.is_visible() && role.id() == role_id)
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' was not found")))?;
        role.mark_deleted(deleted_at)?;
        let name = role.name().clone();

        apply_plan(&mut state.roles, &plan, deleted_at);

        let removed_grants: Vec<PermissionGrant> = state
            .grants
            .iter()
            .filter(|grant| grant.role() == &name)
            .cloned()
            .collect();
        state.grants.retain(|grant| grant.role() != &name);

        let before = state.assignments.len();
        state.assignments.retain(|item| item.role_name != name);
        let removed_assignments = (before - state.assignments.len()) as u64;

        let mut removed_contextual_permissions = 0;
        for permission in state
            .contextual
            .iter_mut()
            .filter(|permission| {
                permission.role_id() == role_id && permission.lifecycle().is_live()
            })
        {
            permission.mark_deleted(deleted_at);
            removed_contextual_permissions += 1;
        }

        Ok(RoleDeletion {
            removed_grants,
            removed_assignments,
            removed_contextual_permissions,
            hierarchy: plan,
        })
    }

    async fn set_role_parent(
        &self,
        role_id: RoleId,
        parent_role_id: Option<RoleId>,
        max_depth: usize,
        updated_at: DateTime<Utc>,
    ) -> AppResult<HierarchyPlan> {
        let mut state = self.state.lock().await;
        let snapshot = HierarchySnapshot::from_roles(&state.roles);
        let plan = snapshot.plan_reparent(role_id, parent_role_id, max_depth)?;
        apply_plan(&mut state.roles, &plan, updated_at);
        Ok(plan)
    }

    async fn list_ancestors(&self, role_id: RoleId) -> AppResult<Vec<EffectiveRole>> {
        let state = self.state.lock().await;
        let snapshot = HierarchySnapshot::from_roles(&state.roles);
        Ok(to_effective(&state.roles, snapshot.ancestors(role_id)?))
    }

    async fn list_descendants(&self, role_id: RoleId) -> AppResult<Vec<EffectiveRole>> {
        let state = self.state.lock().await;
        let snapshot = HierarchySnapshot::from_roles(&state.roles);
        Ok(to_effective(&state.roles, snapshot.descendants(role_id)))
    }
}

#[async_trait]
impl GrantRepository for FakeAccessStore {
    async fn add_grant(&self, grant: &PermissionGrant) -> AppResult<bool> {
        Ok(self.state.lock().await.grants.insert(grant.clone()))
    }

    async fn remove_grant(&self, grant: &PermissionGrant) -> AppResult<bool> {
        Ok(self.state.lock().await.grants.remove(grant))
    }

    async fn list_grants(&self, role: Option<&RoleName>) -> AppResult<Vec<PermissionGrant>> {
        let state = self.state.lock().await;
        Ok(state
            .grants
            .iter()
            .filter(|grant| role.is_none_or(|role| grant.role() == role))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RoleAssignmentRepository for FakeAccessStore {
    async fn assign_role(
        &self,
        subject: &str,
        role: &RoleName,
        assigned_at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        if state
            .assignments
            .iter()
            .any(|item| item.subject == subject && &item.role_name == role)
        {
            return Ok(false);
        }
        state.assignments.push(RoleAssignment {
            subject: subject.to_owned(),
            role_name: role.clone(),
            assigned_at,
        });
        Ok(true)
    }

    async fn revoke_role(&self, subject: &str, role: &RoleName) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        let before = state.assignments.len();
        state
            .assignments
            .retain(|item| !(item.subject == subject && &item.role_name == role));
        Ok(state.assignments.len() != before)
    }

    async fn list_roles_for_subject(&self, subject: &str) -> AppResult<Vec<RoleName>> {
        let state = self.state.lock().await;
        Ok(state
            .assignments
            .iter()
            .filter(|item| item.subject == subject)
            .map(|item| item.role_name.clone())
            .collect())
    }

    async fn list_assignments(&self, role: Option<&RoleName>) -> AppResult<Vec<RoleAssignment>> {
        let state = self.state.lock().await;
        Ok(state
            .assignments
            .iter()
            .filter(|item| role.is_none_or(|role| &item.role_name == role))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ContextualPermissionRepository for FakeAccessStore {
    async fn create_contextual_permission(
        &self,
        permission: ContextualPermission,
    ) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if state
            .contextual
            .iter()
            .any(|existing| existing.lifecycle().is_live() && existing.same_key(&permission))
        {
            return Err(AppError::DuplicateEntry(format!(
                "contextual permission '{}' on '{}' already exists",
                permission.action(),
                permission.resource()
            )));
        }
        state.contextual.push(permission);
        Ok(())
    }

    async fn find_contextual_permission(
        &self,
        id: ContextualPermissionId,
    ) -> AppResult<Option<ContextualPermission>> {
        let state = self.state.lock().await;
        Ok(state
            .contextual
            .iter()
            .find(|permission| permission.id() == id && permission.lifecycle().is_live())
            .cloned())
    }

    async fn delete_contextual_permission(
        &self,
        id: ContextualPermissionId,
        deleted_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let permission = state
            .contextual
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
        let state = self.state.lock().await;
        Ok(state
            .contextual
            .iter()
            .filter(|permission| {
                role_ids.contains(&permission.role_id()) && permission.applies_to(context)
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl OrganizationRepository for FakeAccessStore {
    async fn create_organization(&self, provisioning: OrganizationProvisioning) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if state.organizations.iter().any(|organization| {
            organization.is_visible() && organization.slug() == provisioning.organization.slug()
        }) {
            return Err(AppError::DuplicateName(
                provisioning.organization.slug().to_string(),
            ));
        }
        if state
            .roles
            .iter()
            .any(|role| role.is_visible() && role.name() == provisioning.admin_role.name())
        {
            return Err(AppError::DuplicateName(
                provisioning.admin_role.name().to_string(),
            ));
        }

        state.assignments.push(RoleAssignment {
            subject: provisioning.owner.subject().to_owned(),
            role_name: provisioning.admin_role.name().clone(),
            assigned_at: provisioning.assigned_at,
        });
        state.organizations.push(provisioning.organization);
        state.memberships.push(provisioning.owner);
        state.roles.push(provisioning.admin_role);
        Ok(())
    }

    async fn find_organization(&self, org_id: OrganizationId) -> AppResult<Option<Organization>> {
        let state = self.state.lock().await;
        Ok(state
            .organizations
            .iter()
            .find(|organization| organization.is_visible() && organization.id() == org_id)
            .cloned())
    }

    async fn find_organization_by_slug(
        &self,
        slug: &OrganizationSlug,
    ) -> AppResult<Option<Organization>> {
        let state = self.state.lock().await;
        Ok(state
            .organizations
            .iter()
            .find(|organization| organization.is_visible() && organization.slug() == slug)
            .cloned())
    }

    async fn list_memberships(&self, org_id: OrganizationId) -> AppResult<Vec<Membership>> {
        let state = self.state.lock().await;
        Ok(state
            .memberships
            .iter()
            .filter(|member| member.is_visible() && member.org_id() == org_id)
            .cloned()
            .collect())
    }

    async fn list_memberships_for_subject(&self, subject: &str) -> AppResult<Vec<Membership>> {
        let state = self.state.lock().await;
        Ok(state
            .memberships
            .iter()
            .filter(|member| member.is_visible() && member.subject() == subject)
            .cloned()
            .collect())
    }

    async fn remove_membership(
        &self,
        org_id: OrganizationId,
        actor: &str,
        target: &str,
        removed_at: DateTime<Utc>,
    ) -> AppResult<Membership> {
        let mut state = self.state.lock().await;
        let members: Vec<Membership> = state
            .memberships
            .iter()
            .filter(|member| member.is_visible() && member.org_id() == org_id)
            .cloned()
            .collect();
        MembershipRoster::new(&members).ensure_can_remove(actor, target)?;

        let member = state
            .memberships
            .iter_mut()
            .find(|member| {
                member.is_visible() && member.org_id() == org_id && member.subject() == target
            })
            .ok_or_else(|| AppError::NotFound(format!("subject '{target}' is not a member")))?;
        member.mark_deleted(removed_at);
        let removed = member.clone();

        let tenant_roles: Vec<RoleName> = state
            .roles
            .iter()
            .filter(|role| role.org_id() == Some(org_id))
            .map(|role| role.name().clone())
            .collect();
        state
            .assignments
            .retain(|item| item.subject != target || !tenant_roles.contains(&item.role_name));
        Ok(removed)
    }

    async fn update_membership_role(
        &self,
        org_id: OrganizationId,
        actor: &str,
        target: &str,
        role: MembershipRole,
        updated_at: DateTime<Utc>,
    ) -> AppResult<Membership> {
        let mut state = self.state.lock().await;
        let members: Vec<Membership> = state
            .memberships
            .iter()
            .filter(|member| member.is_visible() && member.org_id() == org_id)
            .cloned()
            .collect();
        MembershipRoster::new(&members).ensure_can_change_role(actor, target, role)?;

        let member = state
            .memberships
            .iter_mut()
            .find(|member| {
                member.is_visible() && member.org_id() == org_id && member.subject() == target
            })
            .ok_or_else(|| AppError::NotFound(format!("subject '{target}' is not a member")))?;
        member.set_role(role);
        let updated = member.clone();

        state.sync_tenant_admin(org_id, target, role, updated_at)?;
        Ok(updated)
    }

    async fn set_primary_organization(
        &self,
        subject: &str,
        org_id: OrganizationId,
    ) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if !state.memberships.iter().any(|member| {
            member.is_visible() && member.subject() == subject && member.org_id() == org_id
        }) {
            return Err(AppError::NotFound(format!(
                "subject '{subject}' is not a member of organization '{org_id}'"
            )));
        }

        for member in state
            .memberships
            .iter_mut()
            .filter(|member| member.is_visible() && member.subject() == subject)
        {
            member.set_primary(member.org_id() == org_id);
        }
        Ok(())
    }
}

#[async_trait]
impl InvitationRepository for FakeAccessStore {
    async fn create_invitation(&self, invitation: Invitation, now: DateTime<Utc>) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if state.memberships.iter().any(|member| {
            member.is_visible()
                && member.org_id() == invitation.org_id()
                && member.email() == Some(invitation.email())
        }) {
            return Err(AppError::AlreadyMember(invitation.email().to_string()));
        }
        if state.invitations.iter().any(|existing| {
            existing.org_id() == invitation.org_id()
                && existing.email() == invitation.email()
                && existing.is_pending(now)
        }) {
            return Err(AppError::InvitationAlreadyPending(
                invitation.email().to_string(),
            ));
        }
        state.invitations.push(invitation);
        Ok(())
    }

    async fn find_invitation(&self, invitation_id: InvitationId) -> AppResult<Option<Invitation>> {
        let state = self.state.lock().await;
        Ok(state
            .invitations
            .iter()
            .find(|invitation| invitation.id() == invitation_id)
            .cloned())
    }

    async fn find_invitation_by_token_hash(
        &self,
        token_hash: &str,
    ) -> AppResult<Option<Invitation>> {
        let state = self.state.lock().await;
        Ok(state
            .invitations
            .iter()
            .find(|invitation| invitation.token_hash() == token_hash)
            .cloned())
    }

    async fn accept_invitation(
        &self,
        token_hash: &str,
        subject: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Membership> {
        let mut state = self.state.lock().await;
        let index = state
            .invitations
            .iter()
            .position(|invitation| invitation.token_hash() == token_hash)
            .ok_or(AppError::InvalidToken)?;
        state.invitations[index].ensure_acceptable(now)?;

        let org_id = state.invitations[index].org_id();
        if state.memberships.iter().any(|member| {
            member.is_visible() && member.org_id() == org_id && member.subject() == subject
        }) {
            return Err(AppError::AlreadyMember(subject.to_owned()));
        }

        let invitation = &mut state.invitations[index];
        invitation.mark_accepted(now)?;
        let membership = Membership::new(
            org_id,
            subject,
            Some(invitation.email().clone()),
            invitation.role(),
            now,
        )?;
        state.sync_tenant_admin(org_id, subject, membership.role(), now)?;
        state.memberships.push(membership.clone());
        Ok(membership)
    }

    async fn revoke_invitation(&self, invitation_id: InvitationId) -> AppResult<Invitation> {
        let mut state = self.state.lock().await;
        let index = state
            .invitations
            .iter()
            .position(|invitation| {
                invitation.id() == invitation_id && invitation.accepted_at().is_none()
            })
            .ok_or_else(|| {
                AppError::NotFound(format!("invitation '{invitation_id}' was not found"))
            })?;
        Ok(state.invitations.remove(index))
    }

    async fn list_pending_invitations(
        &self,
        org_id: OrganizationId,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Invitation>> {
        let state = self.state.lock().await;
        Ok(state
            .invitations
            .iter()
            .filter(|invitation| invitation.org_id() == org_id && invitation.is_pending(now))
            .cloned()
            .collect())
    }

    async fn purge_expired_invitations(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let mut state = self.state.lock().await;
        let before = state.invitations.len();
        state.invitations.retain(|invitation| {
            invitation.accepted_at().is_some() || now <= invitation.expires_at()
        });
        Ok((before - state.invitations.len()) as u64)
    }
}

#[derive(Default)]
pub(crate) struct FakePolicyMatcher {
    grants: Mutex<BTreeSet<PermissionGrant>>,
}

#[async_trait]
impl PolicyMatcher for FakePolicyMatcher {
    async fn has_permission(
        &self,
        roles: &[RoleName],
        resource: &str,
        action: &str,
    ) -> AppResult<bool> {
        let grants = self.grants.lock().await;
        Ok(grants
            .iter()
            .any(|grant| roles.contains(grant.role()) && grant.covers(resource, action)))
    }

    async fn add_grant(&self, grant: &PermissionGrant) -> AppResult<()> {
        self.grants.lock().await.insert(grant.clone());
        Ok(())
    }

    async fn remove_grant(&self, grant: &PermissionGrant) -> AppResult<()> {
        self.grants.lock().await.remove(grant);
        Ok(())
    }

    async fn replace_grants(&self, grants: Vec<PermissionGrant>) -> AppResult<()> {
        *self.grants.lock().await = grants.into_iter().collect();
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeAuditRepository {
    pub(crate) fail: AtomicBool,
    pub(crate) events: Mutex<Vec<AuditEvent>>,
}

#[async_trait]
impl AuditRepository for FakeAuditRepository {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Internal("audit log unavailable".to_owned()));
        }
        self.events.lock().await.push(event);
        Ok(())
    }
}

pub(crate) struct FixedClock {
    now: std::sync::Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub(crate) fn new() -> Self {
        Self {
            now: std::sync::Mutex::new(
                Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0)
                    .single()
                    .unwrap_or_else(|| unreachable!()),
            ),
        }
    }

    pub(crate) fn advance(&self, duration: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(|_| unreachable!());
        *now += duration;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|_| unreachable!())
    }
}

#[derive(Default)]
pub(crate) struct SequentialTokenGenerator {
    counter: AtomicUsize,
}

impl SequentialTokenGenerator {
    pub(crate) fn token(index: usize) -> String {
        format!("token-{index}")
    }
}

impl TokenGenerator for SequentialTokenGenerator {
    fn generate(&self) -> AppResult<String> {
        Ok(Self::token(self.counter.fetch_add(1, Ordering::SeqCst)))
    }
}

#[derive(Default)]
pub(crate) struct FakeEmailService {
    pub(crate) fail: AtomicBool,
    pub(crate) sent: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl EmailService for FakeEmailService {
    async fn send_email(
        &self,
        to: &str,
        _subject: &str,
        text_body: &str,
        _html_body: Option<&str>,
    ) -> AppResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Internal("smtp unavailable".to_owned()));
        }
        self.sent
            .lock()
            .await
            .push((to.to_owned(), text_body.to_owned()));
        Ok(())
    }
}

pub(crate) struct Harness {
    pub(crate) store: Arc<FakeAccessStore>,
    pub(crate) audit: Arc<FakeAuditRepository>,
    pub(crate) email: Arc<FakeEmailService>,
    pub(crate) clock: Arc<FixedClock>,
    pub(crate) authorization: AuthorizationService,
    pub(crate) contextual: ContextualPermissionResolver,
    pub(crate) admin: SecurityAdminService,
    pub(crate) organizations: OrganizationService,
}

impl Harness {
    pub(crate) fn new() -> Self {
        Self::with_settings(AccessControlSettings::default())
    }

    pub(crate) fn with_settings(settings: AccessControlSettings) -> Self {
        let store = Arc::new(FakeAccessStore::default());
        let audit = Arc::new(FakeAuditRepository::default());
        let email = Arc::new(FakeEmailService::default());
        let clock = Arc::new(FixedClock::new());
        let matcher = Arc::new(FakePolicyMatcher::default());

        let hierarchy =
            RoleHierarchyResolver::new(store.clone(), settings.max_hierarchy_depth());
        let contextual = ContextualPermissionResolver::new(hierarchy.clone(), store.clone());
        let authorization = AuthorizationService::new(
            store.clone(),
            store.clone(),
            hierarchy.clone(),
            contextual.clone(),
            matcher.clone(),
        );
        let admin = SecurityAdminService::new(
            authorization.clone(),
            hierarchy,
            SecurityAdminRepositories {
                roles: store.clone(),
                grants: store.clone(),
                assignments: store.clone(),
                contextual_permissions: store.clone(),
                audit: audit.clone(),
            },
            matcher,
            clock.clone(),
            settings.clone(),
        );
        let organizations = OrganizationService::new(
            OrganizationServiceDependencies {
                organizations: store.clone(),
                invitations: store.clone(),
                roles: store.clone(),
                email_service: email.clone(),
                token_generator: Arc::new(SequentialTokenGenerator::default()),
                audit: audit.clone(),
                clock: clock.clone(),
            },
            settings,
        );

        Self {
            store,
            audit,
            email,
            clock,
            authorization,
            contextual,
            admin,
            organizations,
        }
    }

    /// Bootstraps `admin` and assigns it to `root`.
    pub(crate) async fn with_root(self) -> Self {
        self.admin
            .bootstrap_administrator("root")
            .await
            .unwrap_or_else(|_| unreachable!());
        self
    }
}

pub(crate) fn user(subject: &str) -> UserIdentity {
    UserIdentity::new(subject, subject, Some(format!("{subject}@example.com")))
}
