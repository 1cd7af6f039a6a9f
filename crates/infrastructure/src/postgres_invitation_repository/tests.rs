use chrono::{Duration, Utc};
use warden_application::{
    InvitationRepository, MAX_HIERARCHY_DEPTH_LIMIT, OrganizationProvisioning,
    OrganizationRepository, hash_token,
};
use warden_core::{AppError, OrganizationId};
use warden_domain::{
    EmailAddress, Invitation, Membership, MembershipRole, Organization, OrganizationSlug, Role,
};

use super::PostgresInvitationRepository;
use crate::PostgresOrganizationRepository;
use crate::postgres_test_support::{test_pool, unique};

async fn organization(pool: &sqlx::PgPool, owner: &str) -> OrganizationId {
    let now = Utc::now();
    let slug = OrganizationSlug::new(unique("acme")).unwrap_or_else(|_| unreachable!());
    let organization =
        Organization::new(slug.clone(), "Acme", now).unwrap_or_else(|_| unreachable!());
    let owner = Membership::new(
        organization.id(),
        owner,
        Some(EmailAddress::new(format!("{owner}@example.com")).unwrap_or_else(|_| unreachable!())),
        MembershipRole::Owner,
        now,
    )
    .unwrap_or_else(|_| unreachable!());
    let admin_role = Role::new(
        slug.admin_role_name().unwrap_or_else(|_| unreachable!()),
        "Acme administrators",
        now,
    )
    .unwrap_or_else(|_| unreachable!())
    .scoped_to(organization.id());
    let org_id = organization.id();

    let created = PostgresOrganizationRepository::new(pool.clone())
        .create_organization(OrganizationProvisioning {
            organization,
            owner,
            admin_role,
            assigned_at: now,
            max_hierarchy_depth: MAX_HIERARCHY_DEPTH_LIMIT,
        })
        .await;
    assert!(created.is_ok());

    org_id
}

fn invitation(org_id: OrganizationId, email: &str, token: &str) -> Invitation {
    Invitation::new(
        org_id,
        EmailAddress::new(email).unwrap_or_else(|_| unreachable!()),
        MembershipRole::Member,
        hash_token(token),
        "alice",
        Utc::now(),
        Duration::hours(168),
    )
}

#[tokio::test]
async fn accepted_invitation_creates_membership_once() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresInvitationRepository::new(pool.clone());
    let org_id = organization(&pool, &unique("alice")).await;
    let token = unique("token");
    let bob = unique("bob");

    assert!(
        repository
            .create_invitation(invitation(org_id, "bob@example.com", &token), Utc::now())
            .await
            .is_ok()
    );

    let membership = repository
        .accept_invitation(&hash_token(&token), &bob, Utc::now())
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(membership.org_id(), org_id);
    assert_eq!(membership.role(), MembershipRole::Member);
    assert!(membership.is_primary());

    let again = repository
        .accept_invitation(&hash_token(&token), &bob, Utc::now())
        .await;
    assert!(matches!(again, Err(AppError::InvitationAlreadyAccepted)));

    let pending = repository
        .list_pending_invitations(org_id, Utc::now())
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(pending.is_empty());
}

#[tokio::test]
async fn accepted_owner_invitation_assigns_tenant_administrator_role() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresInvitationRepository::new(pool.clone());
    let org_id = organization(&pool, &unique("alice")).await;
    let token = unique("token");
    let bob = unique("bob");
    let owner_invitation = Invitation::new(
        org_id,
        EmailAddress::new("bob@example.com").unwrap_or_else(|_| unreachable!()),
        MembershipRole::Owner,
        hash_token(&token),
        "alice",
        Utc::now(),
        Duration::hours(168),
    );
    assert!(
        repository
            .create_invitation(owner_invitation, Utc::now())
            .await
            .is_ok()
    );

    assert!(
        repository
            .accept_invitation(&hash_token(&token), &bob, Utc::now())
            .await
            .is_ok()
    );

    let tenant_roles = sqlx::query_scalar::<_, String>(
        r#"
        SELECT assignments.role_name
        FROM rbac_subject_roles AS assignments
        INNER JOIN rbac_roles AS roles
            ON roles.name = assignments.role_name AND roles.deleted_at IS NULL
        WHERE assignments.subject = $1 AND roles.org_id = $2
        "#,
    )
    .bind(&bob)
    .bind(org_id.as_uuid())
    .fetch_all(&pool)
    .await
    .unwrap_or_else(|_| unreachable!());
    assert_eq!(tenant_roles.len(), 1);
    assert!(tenant_roles[0].ends_with(":admin"));
}

#[tokio::test]
async fn pending_invitation_blocks_a_second_one() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresInvitationRepository::new(pool.clone());
    let org_id = organization(&pool, &unique("alice")).await;

    let first = invitation(org_id, "carol@example.com", &unique("token"));
    assert!(repository.create_invitation(first.clone(), Utc::now()).await.is_ok());

    let second = repository
        .create_invitation(
            invitation(org_id, "carol@example.com", &unique("token")),
            Utc::now(),
        )
        .await;
    assert!(matches!(second, Err(AppError::InvitationAlreadyPending(_))));

    let revoked = repository
        .revoke_invitation(first.id())
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(revoked.id(), first.id());
    assert!(
        repository
            .find_invitation(first.id())
            .await
            .unwrap_or_else(|_| unreachable!())
            .is_none()
    );
}

#[tokio::test]
async fn member_email_cannot_be_invited() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresInvitationRepository::new(pool.clone());
    let owner = unique("alice");
    let org_id = organization(&pool, &owner).await;

    let result = repository
        .create_invitation(
            invitation(org_id, &format!("{owner}@example.com"), &unique("token")),
            Utc::now(),
        )
        .await;

    assert!(matches!(result, Err(AppError::AlreadyMember(_))));
}

#[tokio::test]
async fn expired_invitation_is_rejected_then_purged() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresInvitationRepository::new(pool.clone());
    let org_id = organization(&pool, &unique("alice")).await;
    let token = unique("token");
    let pending = invitation(org_id, "dave@example.com", &token);
    assert!(repository.create_invitation(pending.clone(), Utc::now()).await.is_ok());

    let later = pending.expires_at() + Duration::seconds(1);
    let result = repository
        .accept_invitation(&hash_token(&token), &unique("dave"), later)
        .await;
    assert!(matches!(result, Err(AppError::InvitationExpired)));

    let purged = repository
        .purge_expired_invitations(later)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(purged >= 1);
    assert!(
        repository
            .find_invitation(pending.id())
            .await
            .unwrap_or_else(|_| unreachable!())
            .is_none()
    );
}

#[tokio::test]
async fn unknown_token_is_invalid() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresInvitationRepository::new(pool);

    let result = repository
        .accept_invitation(&hash_token(&unique("token")), "bob", Utc::now())
        .await;

    assert!(matches!(result, Err(AppError::InvalidToken)));
}
