use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use warden_application::ContextualPermissionRepository;
use warden_core::{AppError, AppResult};
use warden_domain::{
    ContextualPermission, ContextualPermissionId, Lifecycle, PermissionContext, PolicyTerm, RoleId,
};

use crate::postgres_support::is_unique_violation;

/// PostgreSQL-backed repository for contextual allow/deny overrides.
#[derive(Clone)]
pub struct PostgresContextualPermissionRepository {
    pool: PgPool,
}

impl PostgresContextualPermissionRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ContextualPermissionRow {
    id: Uuid,
    role_id: Uuid,
    resource: String,
    action: String,
    context_type: Option<String>,
    context_value: Option<String>,
    is_granted: bool,
    created_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl ContextualPermissionRow {
    fn into_permission(self) -> AppResult<ContextualPermission> {
        let context = match (self.context_type, self.context_value) {
            (Some(context_type), Some(context_value)) => {
                Some(PermissionContext::new(&context_type, &context_value)?)
            }
            (None, None) => None,
            _ => {
                return Err(AppError::Internal(format!(
                    "contextual permission '{}' has a partial context",
                    self.id
                )));
            }
        };

        Ok(ContextualPermission::restore(
            ContextualPermissionId::from_uuid(self.id),
            RoleId::from_uuid(self.role_id),
            PolicyTerm::parse(&self.resource)?,
            PolicyTerm::parse(&self.action)?,
            context,
            self.is_granted,
            Lifecycle::from_deleted_at(self.deleted_at),
            self.created_at,
        ))
    }
}

#[async_trait]
impl ContextualPermissionRepository for PostgresContextualPermissionRepository {
    async fn create_contextual_permission(
        &self,
        permission: ContextualPermission,
    ) -> AppResult<()> {
        let role_exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM rbac_roles
                WHERE id = $1 AND deleted_at IS NULL
            )
            "#,
        )
        .bind(permission.role_id().as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to resolve role: {error}")))?;

        if !role_exists {
            return Err(AppError::NotFound(format!(
                "role '{}' was not found",
                permission.role_id()
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO rbac_contextual_permissions (
                id,
                role_id,
                resource,
                action,
                context_type,
                context_value,
                is_granted,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(permission.id().as_uuid())
        .bind(permission.role_id().as_uuid())
        .bind(permission.resource().as_str())
        .bind(permission.action().as_str())
        .bind(permission.context().map(PermissionContext::context_type))
        .bind(permission.context().map(PermissionContext::context_value))
        .bind(permission.is_granted())
        .bind(permission.created_at())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            if is_unique_violation(&error) {
                return AppError::DuplicateEntry(format!(
                    "contextual permission '{}' on '{}' already exists for role '{}'",
                    permission.action(),
                    permission.resource(),
                    permission.role_id()
                ));
            }

            AppError::Internal(format!("failed to create contextual permission: {error}"))
        })?;

        Ok(())
    }

    async fn find_contextual_permission(
        &self,
        id: ContextualPermissionId,
    ) -> AppResult<Option<ContextualPermission>> {
        sqlx::query_as::<_, ContextualPermissionRow>(
            r#"
            SELECT *
            FROM rbac_contextual_permissions
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to find contextual permission: {error}"))
        })?
        .map(ContextualPermissionRow::into_permission)
        .transpose()
    }

    async fn delete_contextual_permission(
        &self,
        id: ContextualPermissionId,
        deleted_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE rbac_contextual_permissions
            SET deleted_at = $2
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id.as_uuid())
        .bind(deleted_at)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to delete contextual permission: {error}"))
        })?
        .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::NotFound(format!(
                "contextual permission '{id}' was not found"
            )));
        }

        Ok(())
    }

    async fn list_for_roles(
        &self,
        role_ids: &[RoleId],
        context: Option<&PermissionContext>,
    ) -> AppResult<Vec<ContextualPermission>> {
        if role_ids.is_empty() {
            return Ok(Vec::new());
        }

        let role_ids: Vec<Uuid> = role_ids.iter().map(RoleId::as_uuid).collect();
        let rows = sqlx::query_as::<_, ContextualPermissionRow>(
            r#"
            SELECT *
            FROM rbac_contextual_permissions
            WHERE role_id = ANY($1)
                AND deleted_at IS NULL
                AND (
                    context_type IS NULL
                    OR (context_type = $2 AND context_value = $3)
                )
            ORDER BY created_at, id
            "#,
        )
        .bind(&role_ids)
        .bind(context.map(PermissionContext::context_type))
        .bind(context.map(PermissionContext::context_value))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list contextual permissions: {error}"))
        })?;

        rows.into_iter()
            .map(ContextualPermissionRow::into_permission)
            .collect()
    }
}

#[cfg(test)]
mod tests;
