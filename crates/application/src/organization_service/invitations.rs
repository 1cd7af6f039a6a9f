use tracing::warn;
use warden_domain::{Invitation, InvitationId};

use super::*;
use crate::hash_token;

impl OrganizationService {
    /// Invites `email` into an organization and sends the accept link.
    ///
    /// Only owners and admins may invite; only owners may invite owners. If
    /// the link cannot be delivered the invitation is withdrawn and the
    /// delivery error is returned.
    pub async fn invite_to_organization(
        &self,
        actor: &UserIdentity,
        org_id: OrganizationId,
        email: &str,
        role: MembershipRole,
    ) -> AppResult<Invitation> {
        let organization = self.require_organization(org_id).await?;
        let members = self.organizations.list_memberships(org_id).await?;
        MembershipRoster::new(&members).ensure_can_invite(actor.subject(), role)?;

        let email = EmailAddress::new(email)?;
        let now = self.clock.now();
        let raw_token = self.token_generator.generate()?;
        let invitation = Invitation::new(
            org_id,
            email.clone(),
            role,
            hash_token(&raw_token),
            actor.subject(),
            now,
            self.settings.invitation_ttl(),
        );

        self.invitations
            .create_invitation(invitation.clone(), now)
            .await?;

        let accept_url = self.settings.accept_url(&raw_token);
        let subject = format!(
            "{} invited you to {}",
            actor.display_name(),
            organization.name()
        );
        let text_body = format!(
            "{} has invited you to join {} as {}.\n\n\
             Open the link below to accept the invitation:\n{accept_url}\n\n\
             This link expires at {}.",
            actor.display_name(),
            organization.name(),
            role.as_str(),
            invitation.expires_at().to_rfc3339()
        );

        if let Err(error) = self
            .email_service
            .send_email(email.as_str(), &subject, &text_body, None)
            .await
        {
            warn!(
                org_id = %org_id,
                invitation_id = %invitation.id(),
                error = %error,
                "invitation delivery failed, withdrawing invitation"
            );
            self.invitations.revoke_invitation(invitation.id()).await?;
            return Err(error);
        }

        self.append_audit(
            actor.subject(),
            org_id,
            AuditAction::InvitationCreated,
            "organization_invitation",
            invitation.id().to_string(),
            format!("invited '{email}' as '{}'", role.as_str()),
        )
        .await;

        Ok(invitation)
    }

    /// Accepts an invitation for the calling subject.
    pub async fn accept_invitation(
        &self,
        actor: &UserIdentity,
        raw_token: &str,
    ) -> AppResult<Membership> {
        let token = raw_token.trim();
        if token.is_empty() {
            return Err(AppError::InvalidToken);
        }

        let membership = self
            .invitations
            .accept_invitation(&hash_token(token), actor.subject(), self.clock.now())
            .await?;

        self.append_audit(
            actor.subject(),
            membership.org_id(),
            AuditAction::InvitationAccepted,
            "organization_membership",
            format!("{}:{}", membership.org_id(), membership.subject()),
            format!(
                "'{}' joined as '{}'",
                membership.subject(),
                membership.role().as_str()
            ),
        )
        .await;

        Ok(membership)
    }

    /// Withdraws an unaccepted invitation.
    pub async fn revoke_invitation(
        &self,
        actor: &UserIdentity,
        invitation_id: InvitationId,
    ) -> AppResult<()> {
        let invitation = self
            .invitations
            .find_invitation(invitation_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("invitation '{invitation_id}' was not found"))
            })?;

        self.require_member_manager(actor, invitation.org_id())
            .await?;
        if invitation.accepted_at().is_some() {
            return Err(AppError::InvitationAlreadyAccepted);
        }

        self.invitations.revoke_invitation(invitation_id).await?;

        self.append_audit(
            actor.subject(),
            invitation.org_id(),
            AuditAction::InvitationRevoked,
            "organization_invitation",
            invitation_id.to_string(),
            format!("revoked invitation for '{}'", invitation.email()),
        )
        .await;

        Ok(())
    }

    /// Lists invitations that are still pending.
    pub async fn list_pending_invitations(
        &self,
        actor: &UserIdentity,
        org_id: OrganizationId,
    ) -> AppResult<Vec<Invitation>> {
        self.require_member_manager(actor, org_id).await?;
        self.invitations
            .list_pending_invitations(org_id, self.clock.now())
            .await
    }

    /// Deletes expired, unaccepted invitations; returns how many were removed.
    pub async fn purge_expired_invitations(&self) -> AppResult<u64> {
        let purged = self
            .invitations
            .purge_expired_invitations(self.clock.now())
            .await?;

        if purged > 0 {
            info!(purged, "expired invitations purged");
        }

        Ok(purged)
    }
}
