use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};

use warden_application::{GrantRepository, RoleAssignment, RoleAssignmentRepository};
use warden_core::{AppError, AppResult};
use warden_domain::{PermissionGrant, RoleName};

use crate::postgres_support::{begin, commit};

/// PostgreSQL-backed repository for grants and subject role assignments.
#[derive(Clone)]
pub struct PostgresGrantRepository {
    pool: PgPool,
}

impl PostgresGrantRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct GrantRow {
    role_name: String,
    resource: String,
    action: String,
}

#[derive(Debug, FromRow)]
struct AssignmentRow {
    subject: String,
    role_name: String,
    assigned_at: DateTime<Utc>,
}

/// Assigns a role inside an open transaction; returns `false` when present.
pub(crate) async fn insert_assignment(
    transaction: &mut Transaction<'_, Postgres>,
    subject: &str,
    role: &RoleName,
    assigned_at: DateTime<Utc>,
) -> AppResult<bool> {
    let rows_affected = sqlx::query(
        r#"
        INSERT INTO rbac_subject_roles (subject, role_name, assigned_at)
        VALUES ($1, $2, $3)
        ON CONFLICT (subject, role_name) DO NOTHING
        "#,
    )
    .bind(subject)
    .bind(role.as_str())
    .bind(assigned_at)
    .execute(&mut **transaction)
    .await
    .map_err(|error| AppError::Internal(format!("failed to assign role: {error}")))?
    .rows_affected();

    Ok(rows_affected > 0)
}

#[async_trait]
impl GrantRepository for PostgresGrantRepository {
    async fn add_grant(&self, grant: &PermissionGrant) -> AppResult<bool> {
        let rows_affected = sqlx::query(
            r#"
            INSERT INTO rbac_role_grants (role_name, resource, action)
            VALUES ($1, $2, $3)
            ON CONFLICT (role_name, resource, action) DO NOTHING
            "#,
        )
        .bind(grant.role().as_str())
        .bind(grant.resource().as_str())
        .bind(grant.action().as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to add grant: {error}")))?
        .rows_affected();

        Ok(rows_affected > 0)
    }

    async fn remove_grant(&self, grant: &PermissionGrant) -> AppResult<bool> {
        let rows_affected = sqlx::query(
            r#"
            DELETE FROM rbac_role_grants
            WHERE role_name = $1 AND resource = $2 AND action = $3
            "#,
        )
        .bind(grant.role().as_str())
        .bind(grant.resource().as_str())
        .bind(grant.action().as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to remove grant: {error}")))?
        .rows_affected();

        Ok(rows_affected > 0)
    }

    async fn list_grants(&self, role: Option<&RoleName>) -> AppResult<Vec<PermissionGrant>> {
        let rows = sqlx::query_as::<_, GrantRow>(
            r#"
            SELECT role_name, resource, action
            FROM rbac_role_grants
            WHERE $1::TEXT IS NULL OR role_name = $1
            ORDER BY role_name, resource, action
            "#,
        )
        .bind(role.map(RoleName::as_str))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list grants: {error}")))?;

        rows.into_iter()
            .map(|row| PermissionGrant::parse(&row.role_name, &row.resource, &row.action))
            .collect()
    }
}

#[async_trait]
impl RoleAssignmentRepository for PostgresGrantRepository {
    async fn assign_role(
        &self,
        subject: &str,
        role: &RoleName,
        assigned_at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut transaction = begin(&self.pool).await?;
        let inserted = insert_assignment(&mut transaction, subject, role, assigned_at).await?;
        commit(transaction).await?;

        Ok(inserted)
    }

    async fn revoke_role(&self, subject: &str, role: &RoleName) -> AppResult<bool> {
        let rows_affected = sqlx::query(
            r#"
            DELETE FROM rbac_subject_roles
            WHERE subject = $1 AND role_name = $2
            "#,
        )
        .bind(subject)
        .bind(role.as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to revoke role: {error}")))?
        .rows_affected();

        Ok(rows_affected > 0)
    }

    async fn list_roles_for_subject(&self, subject: &str) -> AppResult<Vec<RoleName>> {
        let names = sqlx::query_scalar::<_, String>(
            r#"
            SELECT role_name
            FROM rbac_subject_roles
            WHERE subject = $1
            ORDER BY role_name
            "#,
        )
        .bind(subject)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list roles for subject: {error}"))
        })?;

        names.into_iter().map(RoleName::new).collect()
    }

    async fn list_assignments(&self, role: Option<&RoleName>) -> AppResult<Vec<RoleAssignment>> {
        let rows = sqlx::query_as::<_, AssignmentRow>(
            r#"
            SELECT subject, role_name, assigned_at
            FROM rbac_subject_roles
            WHERE $1::TEXT IS NULL OR role_name = $1
            ORDER BY role_name, subject
            "#,
        )
        .bind(role.map(RoleName::as_str))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list role assignments: {error}")))?;

        rows.into_iter()
            .map(|row| {
                Ok(RoleAssignment {
                    subject: row.subject,
                    role_name: RoleName::new(row.role_name)?,
                    assigned_at: row.assigned_at,
                })
            })
            .collect()
    }
}
