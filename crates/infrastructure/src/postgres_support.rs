use sqlx::{PgPool, Postgres, Transaction};
use warden_core::{AppError, AppResult};

/// Advisory lock serializing every change to the role hierarchy.
pub(crate) const HIERARCHY_LOCK_KEY: i64 = 0x7761_7264_656e;

pub(crate) async fn begin(pool: &PgPool) -> AppResult<Transaction<'static, Postgres>> {
    pool.begin()
        .await
        .map_err(|error| AppError::Internal(format!("failed to begin transaction: {error}")))
}

pub(crate) async fn commit(transaction: Transaction<'_, Postgres>) -> AppResult<()> {
    transaction
        .commit()
        .await
        .map_err(|error| AppError::Internal(format!("failed to commit transaction: {error}")))
}

pub(crate) async fn lock_hierarchy(transaction: &mut Transaction<'_, Postgres>) -> AppResult<()> {
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(HIERARCHY_LOCK_KEY)
        .execute(&mut **transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to lock role hierarchy: {error}")))?;

    Ok(())
}

pub(crate) fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Database(database_error) if database_error.code().as_deref() == Some("23505")
    )
}
