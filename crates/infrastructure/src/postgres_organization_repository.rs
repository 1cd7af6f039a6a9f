use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use warden_application::{OrganizationProvisioning, OrganizationRepository};
use warden_core::{AppError, AppResult, OrganizationId};
use warden_domain::{
    EmailAddress, Lifecycle, Membership, MembershipRole, MembershipRoster, Organization,
    OrganizationSlug, PlanTier,
};

use crate::postgres_grant_repository::insert_assignment;
use crate::postgres_role_repository::insert_role;
use crate::postgres_support::{begin, commit, is_unique_violation};

/// PostgreSQL-backed repository for organizations and memberships.
#[derive(Clone)]
pub struct PostgresOrganizationRepository {
    pool: PgPool,
}

impl PostgresOrganizationRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct OrganizationRow {
    id: Uuid,
    slug: String,
    name: String,
    plan_tier: String,
    is_active: bool,
    settings: Value,
    created_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl OrganizationRow {
    fn into_organization(self) -> AppResult<Organization> {
        Organization::restore(
            OrganizationId::from_uuid(self.id),
            OrganizationSlug::new(self.slug)?,
            self.name,
            self.plan_tier.parse::<PlanTier>()?,
            self.is_active,
            self.settings,
            Lifecycle::from_deleted_at(self.deleted_at),
            self.created_at,
        )
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct MembershipRow {
    org_id: Uuid,
    subject: String,
    email: Option<String>,
    role: String,
    is_primary: bool,
    joined_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl MembershipRow {
    pub(crate) fn into_membership(self) -> AppResult<Membership> {
        Ok(Membership::restore(
            OrganizationId::from_uuid(self.org_id),
            self.subject,
            self.email.map(EmailAddress::new).transpose()?,
            self.role.parse::<MembershipRole>()?,
            self.is_primary,
            self.joined_at,
            Lifecycle::from_deleted_at(self.deleted_at),
        ))
    }
}

/// Inserts a membership inside an open transaction.
pub(crate) async fn insert_membership(
    transaction: &mut Transaction<'_, Postgres>,
    membership: &Membership,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO organization_memberships (org_id, subject, email, role, is_primary, joined_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(membership.org_id().as_uuid())
    .bind(membership.subject())
    .bind(membership.email().map(EmailAddress::as_str))
    .bind(membership.role().as_str())
    .bind(membership.is_primary())
    .bind(membership.joined_at())
    .execute(&mut **transaction)
    .await
    .map_err(|error| {
        if is_unique_violation(&error) {
            return AppError::AlreadyMember(format!(
                "subject '{}' is already a member of organization '{}'",
                membership.subject(),
                membership.org_id()
            ));
        }

        AppError::Internal(format!("failed to create membership: {error}"))
    })?;

    Ok(())
}

/// Locks a visible organization row for the rest of the transaction.
pub(crate) async fn lock_organization(
    transaction: &mut Transaction<'_, Postgres>,
    org_id: OrganizationId,
) -> AppResult<()> {
    sqlx::query_scalar::<_, Uuid>(
        r#"
        SELECT id
        FROM organizations
        WHERE id = $1 AND deleted_at IS NULL
        FOR UPDATE
        "#,
    )
    .bind(org_id.as_uuid())
    .fetch_optional(&mut **transaction)
    .await
    .map_err(|error| AppError::Internal(format!("failed to lock organization: {error}")))?
    .ok_or_else(|| AppError::NotFound(format!("organization '{org_id}' was not found")))?;

    Ok(())
}

/// Loads live memberships of an organization inside an open transaction.
pub(crate) async fn load_memberships(
    transaction: &mut Transaction<'_, Postgres>,
    org_id: OrganizationId,
) -> AppResult<Vec<Membership>> {
    let rows = sqlx::query_as::<_, MembershipRow>(
        r#"
        SELECT org_id, subject, email, role, is_primary, joined_at, deleted_at
        FROM organization_memberships
        WHERE org_id = $1 AND deleted_at IS NULL
        ORDER BY joined_at, subject
        "#,
    )
    .bind(org_id.as_uuid())
    .fetch_all(&mut **transaction)
    .await
    .map_err(|error| AppError::Internal(format!("failed to load memberships: {error}")))?;

    rows.into_iter().map(MembershipRow::into_membership).collect()
}

/// Returns whether the subject already has a primary organization.
pub(crate) async fn has_primary(
    transaction: &mut Transaction<'_, Postgres>,
    subject: &str,
) -> AppResult<bool> {
    sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS (
            SELECT 1
            FROM organization_memberships
            WHERE subject = $1 AND is_primary AND deleted_at IS NULL
        )
        "#,
    )
    .bind(subject)
    .fetch_one(&mut **transaction)
    .await
    .map_err(|error| AppError::Internal(format!("failed to resolve primary membership: {error}")))
}

/// Assigns or revokes `<slug>:admin` so it matches the membership role.
pub(crate) async fn sync_tenant_admin(
    transaction: &mut Transaction<'_, Postgres>,
    org_id: OrganizationId,
    subject: &str,
    role: MembershipRole,
    at: DateTime<Utc>,
) -> AppResult<()> {
    let slug = sqlx::query_scalar::<_, String>("SELECT slug FROM organizations WHERE id = $1")
        .bind(org_id.as_uuid())
        .fetch_optional(&mut **transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to resolve organization: {error}")))?
        .ok_or_else(|| AppError::NotFound(format!("organization '{org_id}' was not found")))?;
    let admin_role = OrganizationSlug::new(slug)?.admin_role_name()?;

    let query = if role.holds_tenant_admin_role() {
        sqlx::query(
            r#"
            INSERT INTO rbac_subject_roles (subject, role_name, assigned_at)
            SELECT $1, name, $3
            FROM rbac_roles
            WHERE name = $2 AND deleted_at IS NULL
            ON CONFLICT (subject, role_name) DO NOTHING
            "#,
        )
        .bind(subject)
        .bind(admin_role.as_str())
        .bind(at)
    } else {
        sqlx::query("DELETE FROM rbac_subject_roles WHERE subject = $1 AND role_name = $2")
            .bind(subject)
            .bind(admin_role.as_str())
    };

    query.execute(&mut **transaction).await.map_err(|error| {
        AppError::Internal(format!("failed to sync tenant administrator role: {error}"))
    })?;

    Ok(())
}

fn not_a_member(org_id: OrganizationId, subject: &str) -> AppError {
    AppError::NotFound(format!(
        "subject '{subject}' is not a member of organization '{org_id}'"
    ))
}

#[async_trait]
impl OrganizationRepository for PostgresOrganizationRepository {
    async fn create_organization(&self, provisioning: OrganizationProvisioning) -> AppResult<()> {
        let OrganizationProvisioning {
            organization,
            owner,
            admin_role,
            assigned_at,
            max_hierarchy_depth,
        } = provisioning;
        let mut transaction = begin(&self.pool).await?;

        sqlx::query(
            r#"
            INSERT INTO organizations (id, slug, name, plan_tier, is_active, settings, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(organization.id().as_uuid())
        .bind(organization.slug().as_str())
        .bind(organization.name())
        .bind(organization.plan_tier().as_str())
        .bind(organization.is_active())
        .bind(organization.settings())
        .bind(organization.created_at())
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            if is_unique_violation(&error) {
                return AppError::DuplicateName(format!(
                    "organization '{}' already exists",
                    organization.slug()
                ));
            }

            AppError::Internal(format!("failed to create organization: {error}"))
        })?;

        let admin_role = insert_role(&mut transaction, admin_role, max_hierarchy_depth).await?;
        insert_assignment(&mut transaction, owner.subject(), admin_role.name(), assigned_at)
            .await?;
        insert_membership(&mut transaction, &owner).await?;

        commit(transaction).await
    }

    async fn find_organization(&self, org_id: OrganizationId) -> AppResult<Option<Organization>> {
        sqlx::query_as::<_, OrganizationRow>(
            r#"
            SELECT id, slug, name, plan_tier, is_active, settings, created_at, deleted_at
            FROM organizations
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(org_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find organization: {error}")))?
        .map(OrganizationRow::into_organization)
        .transpose()
    }

    async fn find_organization_by_slug(
        &self,
        slug: &OrganizationSlug,
    ) -> AppResult<Option<Organization>> {
        sqlx::query_as::<_, OrganizationRow>(
            r#"
            SELECT id, slug, name, plan_tier, is_active, settings, created_at, deleted_at
            FROM organizations
            WHERE slug = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(slug.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find organization: {error}")))?
        .map(OrganizationRow::into_organization)
        .transpose()
    }

    async fn list_memberships(&self, org_id: OrganizationId) -> AppResult<Vec<Membership>> {
        let rows = sqlx::query_as::<_, MembershipRow>(
            r#"
            SELECT org_id, subject, email, role, is_primary, joined_at, deleted_at
            FROM organization_memberships
            WHERE org_id = $1 AND deleted_at IS NULL
            ORDER BY joined_at, subject
            "#,
        )
        .bind(org_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list memberships: {error}")))?;

        rows.into_iter().map(MembershipRow::into_membership).collect()
    }

    async fn list_memberships_for_subject(&self, subject: &str) -> AppResult<Vec<Membership>> {
        let rows = sqlx::query_as::<_, MembershipRow>(
            r#"
            SELECT memberships.org_id,
                memberships.subject,
                memberships.email,
                memberships.role,
                memberships.is_primary,
                memberships.joined_at,
                memberships.deleted_at
            FROM organization_memberships AS memberships
            INNER JOIN organizations
                ON organizations.id = memberships.org_id
            WHERE memberships.subject = $1
                AND memberships.deleted_at IS NULL
                AND organizations.deleted_at IS NULL
            ORDER BY memberships.is_primary DESC, memberships.joined_at
            "#,
        )
        .bind(subject)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list memberships for subject: {error}"))
        })?;

        rows.into_iter().map(MembershipRow::into_membership).collect()
    }

    async fn remove_membership(
        &self,
        org_id: OrganizationId,
        actor: &str,
        target: &str,
        removed_at: DateTime<Utc>,
    ) -> AppResult<Membership> {
        let mut transaction = begin(&self.pool).await?;
        lock_organization(&mut transaction, org_id).await?;

        let members = load_memberships(&mut transaction, org_id).await?;
        let roster = MembershipRoster::new(&members);
        roster.ensure_can_remove(actor, target)?;
        let mut removed = roster
            .member(target)
            .cloned()
            .ok_or_else(|| not_a_member(org_id, target))?;

        sqlx::query(
            r#"
            UPDATE organization_memberships
            SET deleted_at = $3
            WHERE org_id = $1 AND subject = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(org_id.as_uuid())
        .bind(target)
        .bind(removed_at)
        .execute(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to remove membership: {error}")))?;

        sqlx::query(
            r#"
            DELETE FROM rbac_subject_roles
            WHERE subject = $1
                AND role_name IN (SELECT name FROM rbac_roles WHERE org_id = $2)
            "#,
        )
        .bind(target)
        .bind(org_id.as_uuid())
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to revoke tenant role assignments: {error}"))
        })?;

        commit(transaction).await?;

        removed.mark_deleted(removed_at);
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
        let mut transaction = begin(&self.pool).await?;
        lock_organization(&mut transaction, org_id).await?;

        let members = load_memberships(&mut transaction, org_id).await?;
        let roster = MembershipRoster::new(&members);
        roster.ensure_can_change_role(actor, target, role)?;
        let mut updated = roster
            .member(target)
            .cloned()
            .ok_or_else(|| not_a_member(org_id, target))?;

        sqlx::query(
            r#"
            UPDATE organization_memberships
            SET role = $3
            WHERE org_id = $1 AND subject = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(org_id.as_uuid())
        .bind(target)
        .bind(role.as_str())
        .execute(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to update membership: {error}")))?;
        sync_tenant_admin(&mut transaction, org_id, target, role, updated_at).await?;

        commit(transaction).await?;

        updated.set_role(role);
        Ok(updated)
    }

    async fn set_primary_organization(
        &self,
        subject: &str,
        org_id: OrganizationId,
    ) -> AppResult<()> {
        let mut transaction = begin(&self.pool).await?;

        let is_member = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM organization_memberships
                WHERE org_id = $1 AND subject = $2 AND deleted_at IS NULL
            )
            "#,
        )
        .bind(org_id.as_uuid())
        .bind(subject)
        .fetch_one(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to resolve membership: {error}")))?;

        if !is_member {
            return Err(not_a_member(org_id, subject));
        }

        sqlx::query(
            r#"
            UPDATE organization_memberships
            SET is_primary = (org_id = $2)
            WHERE subject = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(subject)
        .bind(org_id.as_uuid())
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to set primary organization: {error}"))
        })?;

        commit(transaction).await
    }
}
