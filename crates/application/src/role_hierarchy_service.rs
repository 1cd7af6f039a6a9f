use std::sync::Arc;

use warden_core::{AppError, AppResult};
use warden_domain::{AncestorWalk, EffectiveRole, Role, RoleName};

use crate::RoleRepository;

/// Expands roles into their inherited role chains.
#[derive(Clone)]
pub struct RoleHierarchyResolver {
    roles: Arc<dyn RoleRepository>,
    max_depth: usize,
}

impl RoleHierarchyResolver {
    /// Creates a resolver bounded by `max_depth` ancestors.
    #[must_use]
    pub fn new(roles: Arc<dyn RoleRepository>, max_depth: usize) -> Self {
        Self { roles, max_depth }
    }

    /// Returns the configured depth bound.
    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Returns the active roles reachable from `role_name`, nearest first.
    pub async fn effective_roles(&self, role_name: &RoleName) -> AppResult<Vec<EffectiveRole>> {
        let role = self
            .roles
            .find_role_by_name(role_name)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role '{role_name}' was not found")))?;

        self.expand(role).await
    }

    /// Walks parent pointers from an already loaded role.
    ///
    /// A pointer to a role that is no longer visible ends the chain.
    pub async fn expand(&self, role: Role) -> AppResult<Vec<EffectiveRole>> {
        let mut walk = AncestorWalk::start(role, self.max_depth);

        while let Some(parent_id) = walk.next_parent() {
            match self.roles.find_role(parent_id).await? {
                Some(parent) => walk.push(parent)?,
                None => break,
            }
        }

        Ok(walk.finish())
    }

    /// Lists ancestors of a role from the materialized closure.
    pub async fn ancestors(&self, role_name: &RoleName) -> AppResult<Vec<EffectiveRole>> {
        let role = self.require_role(role_name).await?;
        self.roles.list_ancestors(role.id()).await
    }

    /// Lists descendants of a role from the materialized closure.
    pub async fn descendants(&self, role_name: &RoleName) -> AppResult<Vec<EffectiveRole>> {
        let role = self.require_role(role_name).await?;
        self.roles.list_descendants(role.id()).await
    }

    async fn require_role(&self, role_name: &RoleName) -> AppResult<Role> {
        self.roles
            .find_role_by_name(role_name)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role '{role_name}' was not found")))
    }
}
