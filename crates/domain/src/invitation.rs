use std::fmt::{Display, Formatter};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use warden_core::{AppError, AppResult, OrganizationId};

use crate::{EmailAddress, MembershipRole};

/// Default invitation lifetime in hours.
pub const DEFAULT_INVITATION_TTL_HOURS: i64 = 24 * 7;

/// Stable identifier of an invitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvitationId(Uuid);

impl InvitationId {
    /// Creates a random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for InvitationId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for InvitationId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Derived invitation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationState {
    /// Waiting for acceptance.
    Pending,
    /// Accepted; terminal.
    Accepted,
    /// Past its expiry without acceptance; terminal.
    Expired,
}

/// Pending or settled invitation into an organization.
///
/// Only the SHA-256 hash of the token is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invitation {
    id: InvitationId,
    org_id: OrganizationId,
    email: EmailAddress,
    role: MembershipRole,
    token_hash: String,
    expires_at: DateTime<Utc>,
    invited_by: String,
    accepted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl Invitation {
    /// Creates a pending invitation expiring `ttl` after `created_at`.
    #[must_use]
    pub fn new(
        org_id: OrganizationId,
        email: EmailAddress,
        role: MembershipRole,
        token_hash: String,
        invited_by: impl Into<String>,
        created_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            id: InvitationId::new(),
            org_id,
            email,
            role,
            token_hash,
            expires_at: created_at + ttl,
            invited_by: invited_by.into(),
            accepted_at: None,
            created_at,
        }
    }

    /// Rehydrates an invitation from storage.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn restore(
        id: InvitationId,
        org_id: OrganizationId,
        email: EmailAddress,
        role: MembershipRole,
        token_hash: String,
        expires_at: DateTime<Utc>,
        invited_by: String,
        accepted_at: Option<DateTime<Utc>>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            org_id,
            email,
            role,
            token_hash,
            expires_at,
            invited_by,
            accepted_at,
            created_at,
        }
    }

    /// Returns the identifier.
    #[must_use]
    pub fn id(&self) -> InvitationId {
        self.id
    }

    /// Returns the target organization.
    #[must_use]
    pub fn org_id(&self) -> OrganizationId {
        self.org_id
    }

    /// Returns the invited email.
    #[must_use]
    pub fn email(&self) -> &EmailAddress {
        &self.email
    }

    /// Returns the membership role granted on acceptance.
    #[must_use]
    pub fn role(&self) -> MembershipRole {
        self.role
    }

    /// Returns the token hash.
    #[must_use]
    pub fn token_hash(&self) -> &str {
        self.token_hash.as_str()
    }

    /// Returns the expiry timestamp.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Returns the inviting subject.
    #[must_use]
    pub fn invited_by(&self) -> &str {
        self.invited_by.as_str()
    }

    /// Returns the acceptance timestamp.
    #[must_use]
    pub fn accepted_at(&self) -> Option<DateTime<Utc>> {
        self.accepted_at
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Derives the state at `now`.
    #[must_use]
    pub fn state(&self, now: DateTime<Utc>) -> InvitationState {
        if self.accepted_at.is_some() {
            InvitationState::Accepted
        } else if now > self.expires_at {
            InvitationState::Expired
        } else {
            InvitationState::Pending
        }
    }

    /// Returns whether the invitation still blocks a new one for the same email.
    #[must_use]
    pub fn is_pending(&self, now: DateTime<Utc>) -> bool {
        self.state(now) == InvitationState::Pending
    }

    /// Ensures the invitation can be accepted at `now`.
    pub fn ensure_acceptable(&self, now: DateTime<Utc>) -> AppResult<()> {
        match self.state(now) {
            InvitationState::Pending => Ok(()),
            InvitationState::Accepted => Err(AppError::InvitationAlreadyAccepted),
            InvitationState::Expired => Err(AppError::InvitationExpired),
        }
    }

    /// Records acceptance.
    pub fn mark_accepted(&mut self, now: DateTime<Utc>) -> AppResult<()> {
        self.ensure_acceptable(now)?;
        self.accepted_at = Some(now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use warden_core::{AppError, OrganizationId};

    use super::{Invitation, InvitationState};
    use crate::{EmailAddress, MembershipRole};

    fn invitation() -> Invitation {
        Invitation::new(
            OrganizationId::new(),
            EmailAddress::new("bob@example.com").unwrap_or_else(|_| unreachable!()),
            MembershipRole::Member,
            "hash".to_owned(),
            "alice",
            Utc::now(),
            Duration::hours(1),
        )
    }

    #[test]
    fn accepted_invitation_cannot_be_reused() {
        let mut invitation = invitation();
        let now = Utc::now();
        assert!(invitation.mark_accepted(now).is_ok());
        assert_eq!(invitation.state(now), InvitationState::Accepted);

        let reused = invitation.mark_accepted(now);
        assert!(matches!(reused, Err(AppError::InvitationAlreadyAccepted)));
    }

    #[test]
    fn expiry_is_derived_from_time() {
        let invitation = invitation();
        let later = invitation.expires_at() + Duration::seconds(1);

        assert_eq!(invitation.state(later), InvitationState::Expired);
        assert!(matches!(
            invitation.ensure_acceptable(later),
            Err(AppError::InvitationExpired)
        ));
        assert!(invitation.ensure_acceptable(invitation.expires_at()).is_ok());
    }

    #[test]
    fn accepted_wins_over_expired() {
        let mut invitation = invitation();
        assert!(invitation.mark_accepted(Utc::now()).is_ok());
        let later = invitation.expires_at() + Duration::days(1);

        assert!(matches!(
            invitation.ensure_acceptable(later),
            Err(AppError::InvitationAlreadyAccepted)
        ));
    }
}
