use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use warden_application::{RoleDeletion, RoleRepository};
use warden_core::{AppError, AppResult, OrganizationId};
use warden_domain::{
    EffectiveRole, HierarchyPlan, HierarchySnapshot, Lifecycle, PermissionGrant, Role, RoleId,
    RoleName, RoleParts,
};

use crate::postgres_support::{begin, commit, is_unique_violation, lock_hierarchy};

/// PostgreSQL-backed repository for roles and the role closure table.
#[derive(Clone)]
pub struct PostgresRoleRepository {
    pool: PgPool,
}

impl PostgresRoleRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct RoleRow {
    id: Uuid,
    name: String,
    display_name: String,
    description: Option<String>,
    is_system: bool,
    is_active: bool,
    parent_role_id: Option<Uuid>,
    hierarchy_level: i32,
    org_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl RoleRow {
    pub(crate) fn into_role(self) -> AppResult<Role> {
        Role::from_parts(RoleParts {
            id: RoleId::from_uuid(self.id),
            name: RoleName::new(self.name)?,
            display_name: self.display_name,
            description: self.description,
            is_system: self.is_system,
            is_active: self.is_active,
            parent_role_id: self.parent_role_id.map(RoleId::from_uuid),
            hierarchy_level: u32::try_from(self.hierarchy_level).map_err(|_| {
                AppError::Internal(format!(
                    "role '{}' has a negative hierarchy level",
                    self.id
                ))
            })?,
            org_id: self.org_id.map(OrganizationId::from_uuid),
            lifecycle: Lifecycle::from_deleted_at(self.deleted_at),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct RelatedRoleRow {
    #[sqlx(flatten)]
    role: RoleRow,
    depth: i32,
}

impl RelatedRoleRow {
    fn into_effective_role(self) -> AppResult<EffectiveRole> {
        let distance = u32::try_from(self.depth)
            .map_err(|_| AppError::Internal("closure depth must not be negative".to_owned()))?;

        Ok(EffectiveRole {
            role: self.role.into_role()?,
            distance,
        })
    }
}

#[derive(Debug, FromRow)]
struct GrantRow {
    role_name: String,
    resource: String,
    action: String,
}

fn level_to_i32(level: u32) -> AppResult<i32> {
    i32::try_from(level)
        .map_err(|_| AppError::Internal(format!("hierarchy level {level} is out of range")))
}

/// Inserts a role and its closure rows inside an open transaction.
///
/// The parent is reread under the hierarchy lock and the stored level is
/// derived from that row. Returns the stored role.
pub(crate) async fn insert_role(
    transaction: &mut Transaction<'_, Postgres>,
    role: Role,
    max_depth: usize,
) -> AppResult<Role> {
    let role = match role.parent_role_id() {
        Some(parent_role_id) => {
            lock_hierarchy(transaction).await?;

            let parent = sqlx::query_as::<_, RoleRow>(
                r#"
                SELECT *
                FROM rbac_roles
                WHERE id = $1 AND deleted_at IS NULL
                "#,
            )
            .bind(parent_role_id.as_uuid())
            .fetch_optional(&mut **transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to resolve parent role: {error}"))
            })?
            .ok_or_else(|| {
                AppError::NotFound(format!("parent role '{parent_role_id}' was not found"))
            })?
            .into_role()?;

            role.with_parent(&parent)?
        }
        None => role,
    };
    role.ensure_depth_within(max_depth)?;

    sqlx::query(
        r#"
        INSERT INTO rbac_roles (
            id,
            name,
            display_name,
            description,
            is_system,
            is_active,
            parent_role_id,
            hierarchy_level,
            org_id,
            created_at,
            updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(role.id().as_uuid())
    .bind(role.name().as_str())
    .bind(role.display_name())
    .bind(role.description())
    .bind(role.is_system())
    .bind(role.is_active())
    .bind(role.parent_role_id().map(|parent| parent.as_uuid()))
    .bind(level_to_i32(role.hierarchy_level())?)
    .bind(role.org_id().map(|org_id| org_id.as_uuid()))
    .bind(role.created_at())
    .bind(role.updated_at())
    .execute(&mut **transaction)
    .await
    .map_err(|error| {
        if is_unique_violation(&error) {
            return AppError::DuplicateName(format!("role '{}' already exists", role.name()));
        }

        AppError::Internal(format!("failed to create role: {error}"))
    })?;

    sqlx::query(
        r#"
        INSERT INTO rbac_role_closure (ancestor_id, descendant_id, depth)
        SELECT $1, $1, 0
        UNION ALL
        SELECT ancestor_id, $1, depth + 1
        FROM rbac_role_closure
        WHERE descendant_id = $2
        "#,
    )
    .bind(role.id().as_uuid())
    .bind(role.parent_role_id().map(|parent| parent.as_uuid()))
    .execute(&mut **transaction)
    .await
    .map_err(|error| AppError::Internal(format!("failed to write role closure: {error}")))?;

    Ok(role)
}

async fn load_snapshot(
    transaction: &mut Transaction<'_, Postgres>,
) -> AppResult<HierarchySnapshot> {
    let rows = sqlx::query_as::<_, (Uuid, Option<Uuid>)>(
        r#"
        SELECT id, parent_role_id
        FROM rbac_roles
        WHERE deleted_at IS NULL
        "#,
    )
    .fetch_all(&mut **transaction)
    .await
    .map_err(|error| AppError::Internal(format!("failed to load role hierarchy: {error}")))?;

    let mut snapshot = HierarchySnapshot::default();
    for (role_id, parent_role_id) in rows {
        snapshot.insert(
            RoleId::from_uuid(role_id),
            parent_role_id.map(RoleId::from_uuid),
        );
    }

    Ok(snapshot)
}

async fn persist_plan(
    transaction: &mut Transaction<'_, Postgres>,
    plan: &HierarchyPlan,
    updated_at: DateTime<Utc>,
) -> AppResult<()> {
    for (role_id, parent_role_id) in &plan.parent_changes {
        sqlx::query(
            r#"
            UPDATE rbac_roles
            SET parent_role_id = $2, updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(role_id.as_uuid())
        .bind(parent_role_id.map(|parent| parent.as_uuid()))
        .bind(updated_at)
        .execute(&mut **transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to move role: {error}")))?;
    }

    for (role_id, level) in &plan.levels {
        sqlx::query("UPDATE rbac_roles SET hierarchy_level = $2 WHERE id = $1")
            .bind(role_id.as_uuid())
            .bind(level_to_i32(*level)?)
            .execute(&mut **transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to update hierarchy level: {error}"))
            })?;
    }

    let affected: Vec<Uuid> = plan.affected.iter().map(RoleId::as_uuid).collect();
    sqlx::query("DELETE FROM rbac_role_closure WHERE descendant_id = ANY($1)")
        .bind(&affected)
        .execute(&mut **transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to clear role closure: {error}")))?;

    let mut ancestors = Vec::with_capacity(plan.edges.len());
    let mut descendants = Vec::with_capacity(plan.edges.len());
    let mut depths = Vec::with_capacity(plan.edges.len());
    for edge in &plan.edges {
        ancestors.push(edge.ancestor.as_uuid());
        descendants.push(edge.descendant.as_uuid());
        depths.push(level_to_i32(edge.depth)?);
    }

    sqlx::query(
        r#"
        INSERT INTO rbac_role_closure (ancestor_id, descendant_id, depth)
        SELECT * FROM UNNEST($1::UUID[], $2::UUID[], $3::INTEGER[])
        "#,
    )
    .bind(&ancestors)
    .bind(&descendants)
    .bind(&depths)
    .execute(&mut **transaction)
    .await
    .map_err(|error| AppError::Internal(format!("failed to write role closure: {error}")))?;

    Ok(())
}

#[async_trait]
impl RoleRepository for PostgresRoleRepository {
    async fn create_role(&self, role: Role, max_depth: usize) -> AppResult<Role> {
        let mut transaction = begin(&self.pool).await?;
        let role = insert_role(&mut transaction, role, max_depth).await?;
        commit(transaction).await?;

        Ok(role)
    }

    async fn save_role(&self, role: &Role) -> AppResult<()> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE rbac_roles
            SET display_name = $2,
                description = $3,
                is_active = $4,
                updated_at = $5
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(role.id().as_uuid())
        .bind(role.display_name())
        .bind(role.description())
        .bind(role.is_active())
        .bind(role.updated_at())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to save role: {error}")))?
        .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::NotFound(format!(
                "role '{}' was not found",
                role.id()
            )));
        }

        Ok(())
    }

    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<Role>> {
        sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT *
            FROM rbac_roles
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(role_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find role: {error}")))?
        .map(RoleRow::into_role)
        .transpose()
    }

    async fn find_role_by_name(&self, name: &RoleName) -> AppResult<Option<Role>> {
        sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT *
            FROM rbac_roles
            WHERE name = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(name.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find role: {error}")))?
        .map(RoleRow::into_role)
        .transpose()
    }

    async fn list_roles(&self, org_id: Option<OrganizationId>) -> AppResult<Vec<Role>> {
        let rows = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT *
            FROM rbac_roles
            WHERE deleted_at IS NULL
                AND ($1::UUID IS NULL OR org_id IS NULL OR org_id = $1)
            ORDER BY name
            "#,
        )
        .bind(org_id.map(|org_id| org_id.as_uuid()))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list roles: {error}")))?;

        rows.into_iter().map(RoleRow::into_role).collect()
    }

    async fn delete_role(
        &self,
        role_id: RoleId,
        deleted_at: DateTime<Utc>,
    ) -> AppResult<RoleDeletion> {
        let mut transaction = begin(&self.pool).await?;
        lock_hierarchy(&mut transaction).await?;

        let role = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT *
            FROM rbac_roles
            WHERE id = $1 AND deleted_at IS NULL
            FOR UPDATE
            "#,
        )
        .bind(role_id.as_uuid())
        .fetch_optional(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find role: {error}")))?
        .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' was not found")))?
        .into_role()?;
        role.ensure_mutable()?;

        let plan = load_snapshot(&mut transaction)
            .await?
            .plan_removal(role_id)?;

        sqlx::query(
            r#"
            UPDATE rbac_roles
            SET deleted_at = $2, updated_at = $2
            WHERE id = $1
            "#,
        )
        .bind(role_id.as_uuid())
        .bind(deleted_at)
        .execute(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to delete role: {error}")))?;

        sqlx::query(
            r#"
            DELETE FROM rbac_role_closure
            WHERE ancestor_id = $1 OR descendant_id = $1
            "#,
        )
        .bind(role_id.as_uuid())
        .execute(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to clear role closure: {error}")))?;

        persist_plan(&mut transaction, &plan, deleted_at).await?;

        let removed_grants = sqlx::query_as::<_, GrantRow>(
            r#"
            DELETE FROM rbac_role_grants
            WHERE role_name = $1
            RETURNING role_name, resource, action
            "#,
        )
        .bind(role.name().as_str())
        .fetch_all(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to remove role grants: {error}")))?
        .into_iter()
        .map(|row| PermissionGrant::parse(&row.role_name, &row.resource, &row.action))
        .collect::<AppResult<Vec<_>>>()?;

        let removed_assignments = sqlx::query("DELETE FROM rbac_subject_roles WHERE role_name = $1")
            .bind(role.name().as_str())
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to remove role assignments: {error}"))
            })?
            .rows_affected();

        let removed_contextual_permissions = sqlx::query(
            r#"
            UPDATE rbac_contextual_permissions
            SET deleted_at = $2
            WHERE role_id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(role_id.as_uuid())
        .bind(deleted_at)
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to remove contextual permissions: {error}"))
        })?
        .rows_affected();

        commit(transaction).await?;

        Ok(RoleDeletion {
            removed_grants,
            removed_assignments,
            removed_contextual_permissions,
            hierarchy: plan,
        })
    }

    async fn set_role_parent(
        &self,
        role_id: RoleId,
        parent_role_id: Option<RoleId>,
        max_depth: usize,
        updated_at: DateTime<Utc>,
    ) -> AppResult<HierarchyPlan> {
        let mut transaction = begin(&self.pool).await?;
        lock_hierarchy(&mut transaction).await?;

        let plan = load_snapshot(&mut transaction)
            .await?
            .plan_reparent(role_id, parent_role_id, max_depth)?;
        persist_plan(&mut transaction, &plan, updated_at).await?;

        commit(transaction).await?;
        Ok(plan)
    }

    async fn list_ancestors(&self, role_id: RoleId) -> AppResult<Vec<EffectiveRole>> {
        let rows = sqlx::query_as::<_, RelatedRoleRow>(
            r#"
            SELECT roles.*, closure.depth
            FROM rbac_role_closure AS closure
            INNER JOIN rbac_roles AS roles
                ON roles.id = closure.ancestor_id
            WHERE closure.descendant_id = $1
                AND closure.depth > 0
                AND roles.deleted_at IS NULL
            ORDER BY closure.depth
            "#,
        )
        .bind(role_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list role ancestors: {error}")))?;

        rows.into_iter()
            .map(RelatedRoleRow::into_effective_role)
            .collect()
    }

    async fn list_descendants(&self, role_id: RoleId) -> AppResult<Vec<EffectiveRole>> {
        let rows = sqlx::query_as::<_, RelatedRoleRow>(
            r#"
            SELECT roles.*, closure.depth
            FROM rbac_role_closure AS closure
            INNER JOIN rbac_roles AS roles
                ON roles.id = closure.descendant_id
            WHERE closure.ancestor_id = $1
                AND closure.depth > 0
                AND roles.deleted_at IS NULL
            ORDER BY closure.depth, roles.name
            "#,
        )
        .bind(role_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list role descendants: {error}"))
        })?;

        rows.into_iter()
            .map(RelatedRoleRow::into_effective_role)
            .collect()
    }
}
