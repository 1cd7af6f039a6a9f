use async_trait::async_trait;
use chrono::{DateTime, Utc};
use warden_core::{AppResult, OrganizationId};
use warden_domain::{Invitation, InvitationId, Membership};

/// Repository port for organization invitations.
#[async_trait]
pub trait InvitationRepository: Send + Sync {
    /// Stores a pending invitation.
    ///
    /// Fails with `AlreadyMember` when the email belongs to a live member and
    /// with `InvitationAlreadyPending` when an invitation for the same
    /// (organization, email) is still pending at `now`.
    async fn create_invitation(&self, invitation: Invitation, now: DateTime<Utc>)
    -> AppResult<()>;

    /// Finds an invitation by identifier.
    async fn find_invitation(&self, invitation_id: InvitationId)
    -> AppResult<Option<Invitation>>;

    /// Finds an invitation by token hash.
    async fn find_invitation_by_token_hash(&self, token_hash: &str)
    -> AppResult<Option<Invitation>>;

    /// Accepts an invitation and creates the membership in one atomic unit.
    ///
    /// Accepting an owner invitation also assigns the tenant administrator role.
    ///
    /// Fails with `InvalidToken`, `InvitationAlreadyAccepted`,
    /// `InvitationExpired` or `AlreadyMember`, checked in that order.
    async fn accept_invitation(
        &self,
        token_hash: &str,
        subject: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Membership>;

    /// Deletes an unaccepted invitation.
    async fn revoke_invitation(&self, invitation_id: InvitationId) -> AppResult<Invitation>;

    /// Lists invitations still pending at `now`.
    async fn list_pending_invitations(
        &self,
        org_id: OrganizationId,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Invitation>>;

    /// Deletes unaccepted invitations expired at `now`; returns the count.
    async fn purge_expired_invitations(&self, now: DateTime<Utc>) -> AppResult<u64>;
}
