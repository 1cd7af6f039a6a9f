use warden_application::{OrganizationProvisioning, OrganizationRepository};
use warden_domain::{MembershipRole, MembershipRoster, OrganizationSlug};

use super::*;

impl AccessState {
    fn live_memberships(&self, org_id: OrganizationId) -> Vec<Membership> {
        self.memberships
            .iter()
            .filter(|member| member.is_visible() && member.org_id() == org_id)
            .cloned()
            .collect()
    }

    fn live_membership_mut(
        &mut self,
        org_id: OrganizationId,
        subject: &str,
    ) -> AppResult<&mut Membership> {
        self.memberships
            .iter_mut()
            .find(|member| {
                member.is_visible() && member.org_id() == org_id && member.subject() == subject
            })
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "subject '{subject}' is not a member of organization '{org_id}'"
                ))
            })
    }

    pub(super) fn has_primary(&self, subject: &str) -> bool {
        self.memberships
            .iter()
            .any(|member| member.is_visible() && member.subject() == subject && member.is_primary())
    }

    /// Assigns or revokes `<slug>:admin` so it matches the membership role.
    pub(super) fn sync_tenant_admin(
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
            .ok_or_else(|| AppError::NotFound(format!("organization '{org_id}' was not found")))?
            .slug()
            .admin_role_name()?;

        if !role.holds_tenant_admin_role() {
            self.assignments.remove(&(subject.to_owned(), name));
        } else if self.live_role_by_name(&name).is_some() {
            self.assignments.entry((subject.to_owned(), name)).or_insert(at);
        }

        Ok(())
    }

    fn revoke_tenant_roles(&mut self, org_id: OrganizationId, subject: &str) {
        let tenant_roles: BTreeSet<RoleName> = self
            .roles
            .values()
            .filter(|role| role.org_id() == Some(org_id))
            .map(|role| role.name().clone())
            .collect();

        self.assignments
            .retain(|(holder, name), _| holder != subject || !tenant_roles.contains(name));
    }
}

#[async_trait]
impl OrganizationRepository for InMemoryAccessStore {
    async fn create_organization(&self, provisioning: OrganizationProvisioning) -> AppResult<()> {
        let OrganizationProvisioning {
            organization,
            owner,
            admin_role,
            assigned_at,
            max_hierarchy_depth,
        } = provisioning;
        let mut state = self.state.write().await;

        if state.organizations.iter().any(|existing| {
            existing.is_visible() && existing.slug() == organization.slug()
        }) {
            return Err(AppError::DuplicateName(format!(
                "organization '{}' already exists",
                organization.slug()
            )));
        }

        let admin_role = state.insert_role(admin_role, max_hierarchy_depth)?;
        state
            .assignments
            .insert((owner.subject().to_owned(), admin_role.name().clone()), assigned_at);
        state.memberships.push(owner);
        state.organizations.push(organization);

        Ok(())
    }

    async fn find_organization(&self, org_id: OrganizationId) -> AppResult<Option<Organization>> {
        let state = self.state.read().await;

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
        let state = self.state.read().await;

        Ok(state
            .organizations
            .iter()
            .find(|organization| organization.is_visible() && organization.slug() == slug)
            .cloned())
    }

    async fn list_memberships(&self, org_id: OrganizationId) -> AppResult<Vec<Membership>> {
        Ok(self.state.read().await.live_memberships(org_id))
    }

    async fn list_memberships_for_subject(&self, subject: &str) -> AppResult<Vec<Membership>> {
        let state = self.state.read().await;

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
        let mut state = self.state.write().await;
        let members = state.live_memberships(org_id);
        MembershipRoster::new(&members).ensure_can_remove(actor, target)?;

        let member = state.live_membership_mut(org_id, target)?;
        member.mark_deleted(removed_at);
        let removed = member.clone();
        state.revoke_tenant_roles(org_id, target);

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
        let mut state = self.state.write().await;
        let members = state.live_memberships(org_id);
        MembershipRoster::new(&members).ensure_can_change_role(actor, target, role)?;
        state.live_membership_mut(org_id, target)?;
        state.sync_tenant_admin(org_id, target, role, updated_at)?;

        let member = state.live_membership_mut(org_id, target)?;
        member.set_role(role);

        Ok(member.clone())
    }

    async fn set_primary_organization(
        &self,
        subject: &str,
        org_id: OrganizationId,
    ) -> AppResult<()> {
        let mut state = self.state.write().await;
        state.live_membership_mut(org_id, subject)?;

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
