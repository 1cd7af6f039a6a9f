use warden_core::{AppError, OrganizationId, UserIdentity};
use warden_domain::{PermissionContext, RoleName, RoleUpdate};

use crate::test_support::{Harness, user};
use crate::{CreateContextualPermissionInput, CreateOrganizationInput, CreateRoleInput};

use super::DecisionSource;

fn root() -> UserIdentity {
    user("root")
}

async fn create_role(harness: &Harness, name: &str, parent: Option<&str>) {
    harness
        .admin
        .create_role(
            &root(),
            CreateRoleInput {
                name: name.to_owned(),
                display_name: name.to_owned(),
                parent: parent.map(str::to_owned),
                ..CreateRoleInput::default()
            },
        )
        .await
        .unwrap_or_else(|_| unreachable!());
}

async fn create_org(harness: &Harness, owner: &str, slug: &str) -> OrganizationId {
    harness
        .organizations
        .create_organization(
            &user(owner),
            CreateOrganizationInput {
                slug: slug.to_owned(),
                name: slug.to_owned(),
                ..CreateOrganizationInput::default()
            },
        )
        .await
        .unwrap_or_else(|_| unreachable!())
        .id()
}

async fn add_override(
    harness: &Harness,
    role: &str,
    resource: &str,
    action: &str,
    org_id: OrganizationId,
    is_granted: bool,
) {
    harness
        .admin
        .create_contextual_permission(
            &root(),
            CreateContextualPermissionInput {
                role_name: role.to_owned(),
                resource: resource.to_owned(),
                action: action.to_owned(),
                context: Some(("organization".to_owned(), org_id.to_string())),
                is_granted,
            },
        )
        .await
        .unwrap_or_else(|_| unreachable!());
}

#[tokio::test]
async fn subject_without_roles_is_denied() {
    let harness = Harness::new().with_root().await;

    let decision = harness
        .authorization
        .authorize("nobody", "documents", "read", None)
        .await
        .unwrap_or_else(|_| unreachable!());

    assert!(!decision.is_allowed());
    assert_eq!(decision.source(), DecisionSource::NoGrant);
}

#[tokio::test]
async fn grants_are_inherited_from_ancestors() {
    let harness = Harness::new().with_root().await;
    create_role(&harness, "viewer", None).await;
    create_role(&harness, "editor", Some("viewer")).await;
    harness
        .admin
        .add_permission(&root(), "viewer", "documents", "read")
        .await
        .unwrap_or_else(|_| unreachable!());
    harness
        .admin
        .assign_role(&root(), "alice", "editor")
        .await
        .unwrap_or_else(|_| unreachable!());

    let decision = harness
        .authorization
        .authorize("alice", "documents", "read", None)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(decision.is_allowed());
    assert_eq!(decision.source(), DecisionSource::PolicyGrant);

    let write = harness
        .authorization
        .check_permission("alice", "documents", "write", None)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(!write);
}

#[tokio::test]
async fn child_of_admin_inherits_full_wildcard() {
    let harness = Harness::new().with_root().await;
    create_role(&harness, "operator", Some("admin")).await;
    harness
        .admin
        .assign_role(&root(), "alice", "operator")
        .await
        .unwrap_or_else(|_| unreachable!());

    let allowed = harness
        .authorization
        .check_permission("alice", "anything", "whatever", None)
        .await
        .unwrap_or_else(|_| unreachable!());

    assert!(allowed);
}

#[tokio::test]
async fn effective_roles_report_distance_from_assignment() {
    let harness = Harness::new().with_root().await;
    create_role(&harness, "viewer", None).await;
    create_role(&harness, "editor", Some("viewer")).await;
    harness
        .admin
        .assign_role(&root(), "alice", "editor")
        .await
        .unwrap_or_else(|_| unreachable!());

    let roles = harness
        .authorization
        .effective_roles_for_subject("alice", None)
        .await
        .unwrap_or_else(|_| unreachable!());

    let summary: Vec<(&str, u32)> = roles
        .iter()
        .map(|entry| (entry.role.name().as_str(), entry.distance))
        .collect();
    assert_eq!(summary, vec![("editor", 0), ("viewer", 1)]);
}

#[tokio::test]
async fn inactive_role_contributes_nothing() {
    let harness = Harness::new().with_root().await;
    create_role(&harness, "viewer", None).await;
    harness
        .admin
        .add_permission(&root(), "viewer", "documents", "read")
        .await
        .unwrap_or_else(|_| unreachable!());
    harness
        .admin
        .assign_role(&root(), "alice", "viewer")
        .await
        .unwrap_or_else(|_| unreachable!());

    let viewer = harness
        .store
        .state
        .lock()
        .await
        .roles
        .iter()
        .find(|role| role.name().as_str() == "viewer")
        .map(|role| role.id())
        .unwrap_or_else(|| unreachable!());
    harness
        .admin
        .update_role(
            &root(),
            viewer,
            RoleUpdate {
                is_active: Some(false),
                ..RoleUpdate::default()
            },
        )
        .await
        .unwrap_or_else(|_| unreachable!());

    let allowed = harness
        .authorization
        .check_permission("alice", "documents", "read", None)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(!allowed);
}

#[tokio::test]
async fn contextual_deny_beats_wildcard_grant() {
    let harness = Harness::new().with_root().await;
    let org_id = create_org(&harness, "alice", "acme").await;

    let before = harness
        .authorization
        .authorize("alice", "billing", "delete", Some(org_id))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(before.is_allowed());

    add_override(&harness, "acme:admin", "billing", "delete", org_id, false).await;

    let after = harness
        .authorization
        .authorize("alice", "billing", "delete", Some(org_id))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(!after.is_allowed());
    assert_eq!(after.source(), DecisionSource::ContextualDeny);

    let other_action = harness
        .authorization
        .check_permission("alice", "billing", "read", Some(org_id))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(other_action);
}

#[tokio::test]
async fn contextual_allow_is_bound_to_its_organization() {
    let harness = Harness::new().with_root().await;
    let acme = create_org(&harness, "alice", "acme").await;
    let globex = create_org(&harness, "alice", "globex").await;
    create_role(&harness, "viewer", None).await;
    harness
        .admin
        .assign_role(&root(), "bob", "viewer")
        .await
        .unwrap_or_else(|_| unreachable!());

    add_override(&harness, "viewer", "reports", "export", acme, true).await;

    let inside = harness
        .authorization
        .authorize("bob", "reports", "export", Some(acme))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(inside.source(), DecisionSource::ContextualAllow);

    let elsewhere = harness
        .authorization
        .authorize("bob", "reports", "export", Some(globex))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(elsewhere.source(), DecisionSource::NoGrant);

    let global = harness
        .authorization
        .check_permission("bob", "reports", "export", None)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(!global);
}

#[tokio::test]
async fn ancestor_deny_beats_nearer_allow() {
    let harness = Harness::new().with_root().await;
    let org_id = create_org(&harness, "alice", "acme").await;
    create_role(&harness, "viewer", None).await;
    create_role(&harness, "editor", Some("viewer")).await;
    harness
        .admin
        .assign_role(&root(), "bob", "editor")
        .await
        .unwrap_or_else(|_| unreachable!());

    add_override(&harness, "viewer", "reports", "export", org_id, false).await;
    add_override(&harness, "editor", "reports", "export", org_id, true).await;

    let decision = harness
        .authorization
        .authorize("bob", "reports", "export", Some(org_id))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(!decision.is_allowed());
    assert_eq!(decision.source(), DecisionSource::ContextualDeny);

    let context = PermissionContext::organization(org_id);
    let editor = RoleName::new("editor").unwrap_or_else(|_| unreachable!());
    let effects = harness
        .contextual
        .effective_contextual_permissions(&editor, Some(&context))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(effects.len(), 1);
    assert!(effects[0].is_granted);
}

#[tokio::test]
async fn deny_reached_through_second_assignment_wins() {
    let harness = Harness::new().with_root().await;
    let org_id = create_org(&harness, "alice", "acme").await;
    create_role(&harness, "viewer", None).await;
    create_role(&harness, "suspended", None).await;
    create_role(&harness, "member", Some("suspended")).await;
    for role in ["viewer", "member"] {
        harness
            .admin
            .assign_role(&root(), "victor", role)
            .await
            .unwrap_or_else(|_| unreachable!());
    }

    add_override(&harness, "viewer", "billing", "read", org_id, true).await;
    add_override(&harness, "suspended", "billing", "read", org_id, false).await;

    let decision = harness
        .authorization
        .authorize("victor", "billing", "read", Some(org_id))
        .await
        .unwrap_or_else(|_| unreachable!());

    assert!(!decision.is_allowed());
    assert_eq!(decision.source(), DecisionSource::ContextualDeny);
}

#[tokio::test]
async fn tenant_roles_do_not_apply_outside_their_organization() {
    let harness = Harness::new().with_root().await;
    let acme = create_org(&harness, "alice", "acme").await;
    let globex = create_org(&harness, "carol", "globex").await;

    let in_acme = harness
        .authorization
        .check_permission("alice", "billing", "read", Some(acme))
        .await
        .unwrap_or_else(|_| unreachable!());
    let in_globex = harness
        .authorization
        .check_permission("alice", "billing", "read", Some(globex))
        .await
        .unwrap_or_else(|_| unreachable!());
    let global = harness
        .authorization
        .check_permission("alice", "billing", "read", None)
        .await
        .unwrap_or_else(|_| unreachable!());

    assert!(in_acme);
    assert!(!in_globex);
    assert!(!global);
}

#[tokio::test]
async fn require_permission_fails_with_permission_denied() {
    let harness = Harness::new().with_root().await;

    let result = harness
        .authorization
        .require_permission("mallory", "rbac", "manage", None)
        .await;

    assert!(matches!(result, Err(AppError::PermissionDenied(_))));
}

#[tokio::test]
async fn removing_a_grant_restores_the_previous_decision() {
    let harness = Harness::new().with_root().await;
    create_role(&harness, "viewer", None).await;
    harness
        .admin
        .assign_role(&root(), "alice", "viewer")
        .await
        .unwrap_or_else(|_| unreachable!());

    harness
        .admin
        .add_permission(&root(), "viewer", "documents", "read")
        .await
        .unwrap_or_else(|_| unreachable!());
    let granted = harness
        .authorization
        .check_permission("alice", "documents", "read", None)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(granted);

    harness
        .admin
        .remove_permission(&root(), "viewer", "documents", "read")
        .await
        .unwrap_or_else(|_| unreachable!());
    let revoked = harness
        .authorization
        .check_permission("alice", "documents", "read", None)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(!revoked);
}
