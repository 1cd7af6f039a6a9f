use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use warden_application::{AuditEvent, AuditRepository};
use warden_core::{AppError, AppResult, OrganizationId};
use warden_domain::AuditAction;

/// PostgreSQL-backed append-only audit repository.
#[derive(Clone)]
pub struct PostgresAuditRepository {
    pool: PgPool,
}

impl PostgresAuditRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Lists the newest events of one organization, or global events when
    /// `org_id` is `None`, newest first.
    pub async fn list_recent_events(
        &self,
        org_id: Option<OrganizationId>,
        limit: u32,
    ) -> AppResult<Vec<AuditEvent>> {
        let rows = sqlx::query_as::<_, AuditEventRow>(
            r#"
            SELECT org_id, subject, action, resource_type, resource_id, detail
            FROM audit_events
            WHERE org_id IS NOT DISTINCT FROM $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(org_id.map(|org_id| org_id.as_uuid()))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list audit events: {error}")))?;

        rows.into_iter().map(AuditEventRow::into_event).collect()
    }
}

#[derive(Debug, FromRow)]
struct AuditEventRow {
    org_id: Option<Uuid>,
    subject: String,
    action: String,
    resource_type: String,
    resource_id: String,
    detail: Option<String>,
}

impl AuditEventRow {
    fn into_event(self) -> AppResult<AuditEvent> {
        Ok(AuditEvent {
            org_id: self.org_id.map(OrganizationId::from_uuid),
            subject: self.subject,
            action: self.action.parse::<AuditAction>()?,
            resource_type: self.resource_type,
            resource_id: self.resource_id,
            detail: self.detail,
        })
    }
}

#[async_trait]
impl AuditRepository for PostgresAuditRepository {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_events (
                org_id,
                subject,
                action,
                resource_type,
                resource_id,
                detail
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(event.org_id.map(|org_id| org_id.as_uuid()))
        .bind(event.subject)
        .bind(event.action.as_str())
        .bind(event.resource_type)
        .bind(event.resource_id)
        .bind(event.detail)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to append audit event: {error}")))?;

        Ok(())
    }
}
