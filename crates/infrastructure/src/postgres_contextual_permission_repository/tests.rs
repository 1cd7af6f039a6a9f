use chrono::Utc;
use warden_application::{ContextualPermissionRepository, RoleRepository};
use warden_core::AppError;
use warden_domain::{ContextualPermission, PermissionContext, PolicyTerm, Role, RoleName};

use super::PostgresContextualPermissionRepository;
use crate::PostgresRoleRepository;
use crate::postgres_test_support::{test_pool, unique};

fn term(value: &str) -> PolicyTerm {
    PolicyTerm::parse(value).unwrap_or_else(|_| unreachable!())
}

fn context(value: &str) -> PermissionContext {
    PermissionContext::new("organization", value).unwrap_or_else(|_| unreachable!())
}

async fn stored_role(pool: &sqlx::PgPool) -> Role {
    let name = RoleName::new(unique("auditor")).unwrap_or_else(|_| unreachable!());
    let role =
        Role::new(name.clone(), name.as_str(), Utc::now()).unwrap_or_else(|_| unreachable!());
    assert!(
        PostgresRoleRepository::new(pool.clone())
            .create_role(role.clone(), 10)
            .await
            .is_ok()
    );

    role
}

#[tokio::test]
async fn duplicate_live_override_is_rejected() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresContextualPermissionRepository::new(pool.clone());
    let role = stored_role(&pool).await;

    let first = ContextualPermission::new(
        role.id(),
        term("reports"),
        term("export"),
        Some(context("acme")),
        false,
        Utc::now(),
    );
    let second = ContextualPermission::new(
        role.id(),
        term("reports"),
        term("export"),
        Some(context("acme")),
        true,
        Utc::now(),
    );

    assert!(repository.create_contextual_permission(first.clone()).await.is_ok());
    let result = repository.create_contextual_permission(second.clone()).await;
    assert!(matches!(result, Err(AppError::DuplicateEntry(_))));

    assert!(
        repository
            .delete_contextual_permission(first.id(), Utc::now())
            .await
            .is_ok()
    );
    assert!(repository.create_contextual_permission(second).await.is_ok());
}

#[tokio::test]
async fn list_for_roles_matches_absent_or_equal_context() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresContextualPermissionRepository::new(pool.clone());
    let role = stored_role(&pool).await;

    for permission_context in [None, Some(context("acme")), Some(context("globex"))] {
        let permission = ContextualPermission::new(
            role.id(),
            term("reports"),
            term("export"),
            permission_context,
            true,
            Utc::now(),
        );
        assert!(repository.create_contextual_permission(permission).await.is_ok());
    }

    let acme = context("acme");
    let matching = repository
        .list_for_roles(&[role.id()], Some(&acme))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(matching.len(), 2);
    assert!(
        matching
            .iter()
            .all(|permission| permission.context().is_none_or(|own| own == &acme))
    );

    let without_context = repository
        .list_for_roles(&[role.id()], None)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(without_context.len(), 1);
}

#[tokio::test]
async fn override_for_missing_role_is_rejected() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresContextualPermissionRepository::new(pool);

    let permission = ContextualPermission::new(
        warden_domain::RoleId::new(),
        term("reports"),
        term("export"),
        None,
        true,
        Utc::now(),
    );

    let result = repository.create_contextual_permission(permission).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}
