use super::*;

impl OrganizationService {
    /// Lists live members; the caller must be a member.
    pub async fn list_members(
        &self,
        actor: &UserIdentity,
        org_id: OrganizationId,
    ) -> AppResult<Vec<Membership>> {
        self.require_organization(org_id).await?;
        let members = self.organizations.list_memberships(org_id).await?;

        if MembershipRoster::new(&members)
            .member(actor.subject())
            .is_none()
        {
            return Err(AppError::PermissionDenied(format!(
                "subject '{}' is not a member of organization '{org_id}'",
                actor.subject()
            )));
        }

        Ok(members)
    }

    /// Removes `target` from an organization.
    ///
    /// Members may always leave; removing others requires owner or admin and
    /// removing an owner requires owner. The last owner cannot be removed.
    pub async fn remove_member(
        &self,
        actor: &UserIdentity,
        org_id: OrganizationId,
        target: &str,
    ) -> AppResult<()> {
        let removed = self
            .organizations
            .remove_membership(org_id, actor.subject(), target, self.clock.now())
            .await?;

        self.append_audit(
            actor.subject(),
            org_id,
            AuditAction::MemberRemoved,
            "organization_membership",
            format!("{org_id}:{}", removed.subject()),
            format!(
                "removed '{}' ({})",
                removed.subject(),
                removed.role().as_str()
            ),
        )
        .await;

        Ok(())
    }

    /// Changes a member's role under the same guards as removal.
    pub async fn update_member_role(
        &self,
        actor: &UserIdentity,
        org_id: OrganizationId,
        target: &str,
        role: MembershipRole,
    ) -> AppResult<Membership> {
        let membership = self
            .organizations
            .update_membership_role(org_id, actor.subject(), target, role, self.clock.now())
            .await?;

        self.append_audit(
            actor.subject(),
            org_id,
            AuditAction::MemberRoleChanged,
            "organization_membership",
            format!("{org_id}:{target}"),
            format!("changed role of '{target}' to '{}'", role.as_str()),
        )
        .await;

        Ok(membership)
    }
}
