use warden_application::InvitationRepository;
use warden_domain::InvitationId;

use super::*;

#[async_trait]
impl InvitationRepository for InMemoryAccessStore {
    async fn create_invitation(&self, invitation: Invitation, now: DateTime<Utc>) -> AppResult<()> {
        let mut state = self.state.write().await;

        if state.memberships.iter().any(|member| {
            member.is_visible()
                && member.org_id() == invitation.org_id()
                && member.email() == Some(invitation.email())
        }) {
            return Err(AppError::AlreadyMember(format!(
                "'{}' is already a member of organization '{}'",
                invitation.email(),
                invitation.org_id()
            )));
        }

        if state.invitations.iter().any(|existing| {
            existing.org_id() == invitation.org_id()
                && existing.email() == invitation.email()
                && existing.is_pending(now)
        }) {
            return Err(AppError::InvitationAlreadyPending(format!(
                "an invitation for '{}' is already pending",
                invitation.email()
            )));
        }

        state.invitations.push(invitation);
        Ok(())
    }

    async fn find_invitation(&self, invitation_id: InvitationId) -> AppResult<Option<Invitation>> {
        let state = self.state.read().await;

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
        let state = self.state.read().await;

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
        let mut state = self.state.write().await;
        let index = state
            .invitations
            .iter()
            .position(|invitation| invitation.token_hash() == token_hash)
            .ok_or(AppError::InvalidToken)?;

        let mut invitation = state.invitations[index].clone();
        invitation.ensure_acceptable(now)?;

        let org_id = invitation.org_id();
        if state.memberships.iter().any(|member| {
            member.is_visible() && member.org_id() == org_id && member.subject() == subject
        }) {
            return Err(AppError::AlreadyMember(format!(
                "subject '{subject}' is already a member of organization '{org_id}'"
            )));
        }

        let mut membership = Membership::new(
            org_id,
            subject,
            Some(invitation.email().clone()),
            invitation.role(),
            now,
        )?;
        if !state.has_primary(subject) {
            membership = membership.primary();
        }

        invitation.mark_accepted(now)?;
        state.sync_tenant_admin(org_id, subject, membership.role(), now)?;
        state.invitations[index] = invitation;
        state.memberships.push(membership.clone());

        Ok(membership)
    }

    async fn revoke_invitation(&self, invitation_id: InvitationId) -> AppResult<Invitation> {
        let mut state = self.state.write().await;
        let index = state
            .invitations
            .iter()
            .position(|invitation| invitation.id() == invitation_id)
            .ok_or_else(|| {
                AppError::NotFound(format!("invitation '{invitation_id}' was not found"))
            })?;

        if state.invitations[index].accepted_at().is_some() {
            return Err(AppError::InvitationAlreadyAccepted);
        }

        Ok(state.invitations.remove(index))
    }

    async fn list_pending_invitations(
        &self,
        org_id: OrganizationId,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Invitation>> {
        let state = self.state.read().await;

        Ok(state
            .invitations
            .iter()
            .filter(|invitation| invitation.org_id() == org_id && invitation.is_pending(now))
            .cloned()
            .collect())
    }

    async fn purge_expired_invitations(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let mut state = self.state.write().await;
        let before = state.invitations.len();
        state.invitations.retain(|invitation| {
            invitation.accepted_at().is_some() || now <= invitation.expires_at()
        });

        Ok(u64::try_from(before - state.invitations.len()).unwrap_or(u64::MAX))
    }
}
