use warden_domain::{PermissionGrant, PolicyTerm};

use super::*;

impl SecurityAdminService {
    /// Ensures the built-in `admin` role exists with a full wildcard grant.
    ///
    /// Idempotent; meant for the composition root only.
    pub async fn bootstrap_system_roles(&self) -> AppResult<Role> {
        let name = RoleName::new(SYSTEM_ADMIN_ROLE)?;
        let role = match self.roles.find_role_by_name(&name).await? {
            Some(role) => role,
            None => {
                let role = Role::new(name.clone(), "Administrator", self.clock.now())?
                    .with_description(Some("Full access to every resource".to_owned()))
                    .into_system();
                let role = self
                    .roles
                    .create_role(role, self.settings.max_hierarchy_depth())
                    .await?;

                self.append_audit(
                    SYSTEM_SUBJECT,
                    None,
                    AuditAction::RoleCreated,
                    "rbac_role",
                    name.to_string(),
                    format!("bootstrapped system role '{name}'"),
                )
                .await;

                role
            }
        };

        let grant = PermissionGrant::new(name, PolicyTerm::Any, PolicyTerm::Any);
        if self.grants.add_grant(&grant).await? {
            self.append_audit(
                SYSTEM_SUBJECT,
                None,
                AuditAction::PermissionGranted,
                "rbac_role_grant",
                format!("{}:*:*", role.name()),
                format!("granted '*' on '*' to role '{}'", role.name()),
            )
            .await;
        }
        self.matcher.add_grant(&grant).await?;

        Ok(role)
    }

    /// Assigns the built-in `admin` role to `subject`. Idempotent.
    pub async fn bootstrap_administrator(&self, subject: &str) -> AppResult<()> {
        let role = self.bootstrap_system_roles().await?;

        if !self
            .assignments
            .assign_role(subject, role.name(), self.clock.now())
            .await?
        {
            return Ok(());
        }

        self.append_audit(
            SYSTEM_SUBJECT,
            None,
            AuditAction::RoleAssigned,
            "rbac_subject_role",
            format!("{subject}:{}", role.name()),
            format!("bootstrapped administrator '{subject}'"),
        )
        .await;

        Ok(())
    }

    /// Reloads every stored grant into the policy matcher.
    pub async fn sync_policy_matcher(&self) -> AppResult<usize> {
        let grants = self.grants.list_grants(None).await?;
        let count = grants.len();
        self.matcher.replace_grants(grants).await?;

        info!(grants = count, "policy matcher synchronized");
        Ok(count)
    }
}
