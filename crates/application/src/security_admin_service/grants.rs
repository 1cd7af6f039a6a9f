use warden_domain::{PermissionGrant, PolicyTerm};

use super::*;
use crate::RoleAssignment;

impl SecurityAdminService {
    /// Grants `action` on `resource` to a role. Adding an existing grant is a no-op.
    pub async fn add_permission(
        &self,
        actor: &UserIdentity,
        role_name: &str,
        resource: &str,
        action: &str,
    ) -> AppResult<()> {
        let role = self.require_role(&RoleName::new(role_name)?).await?;
        self.require_manage_permission(actor, role.org_id()).await?;
        role.ensure_assignable()?;

        let grant = PermissionGrant::new(
            role.name().clone(),
            PolicyTerm::parse(resource)?,
            PolicyTerm::parse(action)?,
        );

        let added = self.grants.add_grant(&grant).await?;
        self.matcher.add_grant(&grant).await?;
        if !added {
            return Ok(());
        }

        self.append_audit(
            actor.subject(),
            role.org_id(),
            AuditAction::PermissionGranted,
            "rbac_role_grant",
            format!("{}:{}:{}", role.name(), grant.resource(), grant.action()),
            format!(
                "granted '{}' on '{}' to role '{}'",
                grant.action(),
                grant.resource(),
                role.name()
            ),
        )
        .await;

        Ok(())
    }

    /// Removes a grant. Removing a missing grant is a no-op.
    pub async fn remove_permission(
        &self,
        actor: &UserIdentity,
        role_name: &str,
        resource: &str,
        action: &str,
    ) -> AppResult<()> {
        let name = RoleName::new(role_name)?;
        let org_id = self
            .roles
            .find_role_by_name(&name)
            .await?
            .and_then(|role| role.org_id());
        self.require_manage_permission(actor, org_id).await?;

        let grant = PermissionGrant::new(
            name,
            PolicyTerm::parse(resource)?,
            PolicyTerm::parse(action)?,
        );

        let removed = self.grants.remove_grant(&grant).await?;
        self.matcher.remove_grant(&grant).await?;
        if !removed {
            return Ok(());
        }

        self.append_audit(
            actor.subject(),
            org_id,
            AuditAction::PermissionRevoked,
            "rbac_role_grant",
            format!("{}:{}:{}", grant.role(), grant.resource(), grant.action()),
            format!(
                "revoked '{}' on '{}' from role '{}'",
                grant.action(),
                grant.resource(),
                grant.role()
            ),
        )
        .await;

        Ok(())
    }

    /// Lists the grants attached directly to a role.
    pub async fn list_permissions(
        &self,
        actor: &UserIdentity,
        role_name: &str,
    ) -> AppResult<Vec<PermissionGrant>> {
        let role = self.require_role(&RoleName::new(role_name)?).await?;
        self.require_manage_permission(actor, role.org_id()).await?;
        self.grants.list_grants(Some(role.name())).await
    }

    /// Assigns a role to a subject and emits an audit event.
    pub async fn assign_role(
        &self,
        actor: &UserIdentity,
        subject: &str,
        role_name: &str,
    ) -> AppResult<()> {
        let role = self.require_role(&RoleName::new(role_name)?).await?;
        self.require_manage_permission(actor, role.org_id()).await?;
        role.ensure_assignable()?;

        let subject = subject.trim();
        if subject.is_empty() {
            return Err(AppError::Validation(
                "subject must not be empty".to_owned(),
            ));
        }

        if !self
            .assignments
            .assign_role(subject, role.name(), self.clock.now())
            .await?
        {
            return Ok(());
        }

        self.append_audit(
            actor.subject(),
            role.org_id(),
            AuditAction::RoleAssigned,
            "rbac_subject_role",
            format!("{subject}:{}", role.name()),
            format!("assigned role '{}' to '{subject}'", role.name()),
        )
        .await;

        Ok(())
    }

    /// Removes a role assignment from a subject. Revoking a missing
    /// assignment is a no-op.
    pub async fn revoke_role(
        &self,
        actor: &UserIdentity,
        subject: &str,
        role_name: &str,
    ) -> AppResult<()> {
        let name = RoleName::new(role_name)?;
        let org_id = self
            .roles
            .find_role_by_name(&name)
            .await?
            .and_then(|role| role.org_id());
        self.require_manage_permission(actor, org_id).await?;

        if !self.assignments.revoke_role(subject, &name).await? {
            return Ok(());
        }

        self.append_audit(
            actor.subject(),
            org_id,
            AuditAction::RoleUnassigned,
            "rbac_subject_role",
            format!("{subject}:{name}"),
            format!("removed role '{name}' from '{subject}'"),
        )
        .await;

        Ok(())
    }

    /// Lists assignments, optionally for one role.
    pub async fn list_role_assignments(
        &self,
        actor: &UserIdentity,
        role_name: Option<&str>,
    ) -> AppResult<Vec<RoleAssignment>> {
        match role_name {
            Some(role_name) => {
                let role = self.require_role(&RoleName::new(role_name)?).await?;
                self.require_manage_permission(actor, role.org_id()).await?;
                self.assignments.list_assignments(Some(role.name())).await
            }
            None => {
                self.require_manage_permission(actor, None).await?;
                self.assignments.list_assignments(None).await
            }
        }
    }
}
