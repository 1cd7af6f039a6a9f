use warden_application::{GrantRepository, RoleAssignment, RoleAssignmentRepository};

use super::*;

#[async_trait]
impl GrantRepository for InMemoryAccessStore {
    async fn add_grant(&self, grant: &PermissionGrant) -> AppResult<bool> {
        Ok(self.state.write().await.grants.insert(grant.clone()))
    }

    async fn remove_grant(&self, grant: &PermissionGrant) -> AppResult<bool> {
        Ok(self.state.write().await.grants.remove(grant))
    }

    async fn list_grants(&self, role: Option<&RoleName>) -> AppResult<Vec<PermissionGrant>> {
        let state = self.state.read().await;

        Ok(state
            .grants
            .iter()
            .filter(|grant| role.is_none_or(|role| grant.role() == role))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RoleAssignmentRepository for InMemoryAccessStore {
    async fn assign_role(
        &self,
        subject: &str,
        role: &RoleName,
        assigned_at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut state = self.state.write().await;
        let key = (subject.to_owned(), role.clone());
        if state.assignments.contains_key(&key) {
            return Ok(false);
        }

        state.assignments.insert(key, assigned_at);
        Ok(true)
    }

    async fn revoke_role(&self, subject: &str, role: &RoleName) -> AppResult<bool> {
        let mut state = self.state.write().await;

        Ok(state
            .assignments
            .remove(&(subject.to_owned(), role.clone()))
            .is_some())
    }

    async fn list_roles_for_subject(&self, subject: &str) -> AppResult<Vec<RoleName>> {
        let state = self.state.read().await;

        Ok(state
            .assignments
            .keys()
            .filter(|(assigned_subject, _)| assigned_subject == subject)
            .map(|(_, role_name)| role_name.clone())
            .collect())
    }

    async fn list_assignments(&self, role: Option<&RoleName>) -> AppResult<Vec<RoleAssignment>> {
        let state = self.state.read().await;

        Ok(state
            .assignments
            .iter()
            .filter(|((_, role_name), _)| role.is_none_or(|role| role_name == role))
            .map(|((subject, role_name), assigned_at)| RoleAssignment {
                subject: subject.clone(),
                role_name: role_name.clone(),
                assigned_at: *assigned_at,
            })
            .collect())
    }
}
