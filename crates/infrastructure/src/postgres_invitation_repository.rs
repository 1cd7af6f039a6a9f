use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use warden_application::InvitationRepository;
use warden_core::{AppError, AppResult, OrganizationId};
use warden_domain::{
    EmailAddress, Invitation, InvitationId, Membership, MembershipRole, MembershipRoster,
};

use crate::postgres_organization_repository::{
    has_primary, insert_membership, load_memberships, lock_organization, sync_tenant_admin,
};
use crate::postgres_support::{begin, commit, is_unique_violation};

/// PostgreSQL-backed repository for organization invitations.
#[derive(Clone)]
pub struct PostgresInvitationRepository {
    pool: PgPool,
}

impl PostgresInvitationRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct InvitationRow {
    id: Uuid,
    org_id: Uuid,
    email: String,
    role: String,
    token_hash: String,
    expires_at: DateTime<Utc>,
    invited_by: String,
    accepted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl InvitationRow {
    fn into_invitation(self) -> AppResult<Invitation> {
        Ok(Invitation::restore(
            InvitationId::from_uuid(self.id),
            OrganizationId::from_uuid(self.org_id),
            EmailAddress::new(self.email)?,
            self.role.parse::<MembershipRole>()?,
            self.token_hash,
            self.expires_at,
            self.invited_by,
            self.accepted_at,
            self.created_at,
        ))
    }
}

#[async_trait]
impl InvitationRepository for PostgresInvitationRepository {
    async fn create_invitation(&self, invitation: Invitation, now: DateTime<Utc>) -> AppResult<()> {
        let mut transaction = begin(&self.pool).await?;
        lock_organization(&mut transaction, invitation.org_id()).await?;

        let members = load_memberships(&mut transaction, invitation.org_id()).await?;
        if MembershipRoster::new(&members).has_email(invitation.email()) {
            return Err(AppError::AlreadyMember(format!(
                "'{}' is already a member of organization '{}'",
                invitation.email(),
                invitation.org_id()
            )));
        }

        let pending = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM organization_invitations
                WHERE org_id = $1
                    AND email = $2
                    AND accepted_at IS NULL
                    AND expires_at >= $3
            )
            "#,
        )
        .bind(invitation.org_id().as_uuid())
        .bind(invitation.email().as_str())
        .bind(now)
        .fetch_one(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to resolve pending invitations: {error}"))
        })?;

        if pending {
            return Err(AppError::InvitationAlreadyPending(format!(
                "an invitation for '{}' is already pending",
                invitation.email()
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO organization_invitations (
                id,
                org_id,
                email,
                role,
                token_hash,
                expires_at,
                invited_by,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(invitation.id().as_uuid())
        .bind(invitation.org_id().as_uuid())
        .bind(invitation.email().as_str())
        .bind(invitation.role().as_str())
        .bind(invitation.token_hash())
        .bind(invitation.expires_at())
        .bind(invitation.invited_by())
        .bind(invitation.created_at())
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            if is_unique_violation(&error) {
                return AppError::Internal("invitation token collision".to_owned());
            }

            AppError::Internal(format!("failed to create invitation: {error}"))
        })?;

        commit(transaction).await
    }

    async fn find_invitation(&self, invitation_id: InvitationId) -> AppResult<Option<Invitation>> {
        sqlx::query_as::<_, InvitationRow>(
            r#"
            SELECT *
            FROM organization_invitations
            WHERE id = $1
            "#,
        )
        .bind(invitation_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find invitation: {error}")))?
        .map(InvitationRow::into_invitation)
        .transpose()
    }

    async fn find_invitation_by_token_hash(
        &self,
        token_hash: &str,
    ) -> AppResult<Option<Invitation>> {
        sqlx::query_as::<_, InvitationRow>(
            r#"
            SELECT *
            FROM organization_invitations
            WHERE token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find invitation: {error}")))?
        .map(InvitationRow::into_invitation)
        .transpose()
    }

    async fn accept_invitation(
        &self,
        token_hash: &str,
        subject: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Membership> {
        let mut transaction = begin(&self.pool).await?;

        let mut invitation = sqlx::query_as::<_, InvitationRow>(
            r#"
            SELECT *
            FROM organization_invitations
            WHERE token_hash = $1
            FOR UPDATE
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find invitation: {error}")))?
        .ok_or(AppError::InvalidToken)?
        .into_invitation()?;
        invitation.ensure_acceptable(now)?;

        let org_id = invitation.org_id();
        lock_organization(&mut transaction, org_id).await?;
        let members = load_memberships(&mut transaction, org_id).await?;
        if MembershipRoster::new(&members).member(subject).is_some() {
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
        if !has_primary(&mut transaction, subject).await? {
            membership = membership.primary();
        }

        invitation.mark_accepted(now)?;
        sqlx::query("UPDATE organization_invitations SET accepted_at = $2 WHERE id = $1")
            .bind(invitation.id().as_uuid())
            .bind(invitation.accepted_at())
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to accept invitation: {error}"))
            })?;
        insert_membership(&mut transaction, &membership).await?;
        sync_tenant_admin(&mut transaction, org_id, subject, membership.role(), now).await?;

        commit(transaction).await?;
        Ok(membership)
    }

    async fn revoke_invitation(&self, invitation_id: InvitationId) -> AppResult<Invitation> {
        let mut transaction = begin(&self.pool).await?;

        let invitation = sqlx::query_as::<_, InvitationRow>(
            r#"
            SELECT *
            FROM organization_invitations
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(invitation_id.as_uuid())
        .fetch_optional(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find invitation: {error}")))?
        .ok_or_else(|| AppError::NotFound(format!("invitation '{invitation_id}' was not found")))?
        .into_invitation()?;

        if invitation.accepted_at().is_some() {
            return Err(AppError::InvitationAlreadyAccepted);
        }

        sqlx::query("DELETE FROM organization_invitations WHERE id = $1")
            .bind(invitation_id.as_uuid())
            .execute(&mut *transaction)
            .await
            .map_err(|error| AppError::Internal(format!("failed to revoke invitation: {error}")))?;

        commit(transaction).await?;
        Ok(invitation)
    }

    async fn list_pending_invitations(
        &self,
        org_id: OrganizationId,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Invitation>> {
        let rows = sqlx::query_as::<_, InvitationRow>(
            r#"
            SELECT *
            FROM organization_invitations
            WHERE org_id = $1
                AND accepted_at IS NULL
                AND expires_at >= $2
            ORDER BY created_at, email
            "#,
        )
        .bind(org_id.as_uuid())
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list pending invitations: {error}"))
        })?;

        rows.into_iter().map(InvitationRow::into_invitation).collect()
    }

    async fn purge_expired_invitations(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let rows_affected = sqlx::query(
            r#"
            DELETE FROM organization_invitations
            WHERE accepted_at IS NULL AND expires_at < $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to purge expired invitations: {error}"))
        })?
        .rows_affected();

        Ok(rows_affected)
    }
}

#[cfg(test)]
mod tests;
