use std::sync::Arc;

use warden_core::AppResult;
use warden_domain::{
    ContextualEffect, ContextualPermission, EffectiveRole, PermissionContext, RoleId, RoleName,
    resolve_contextual_permissions,
};

use crate::{ContextualPermissionRepository, RoleHierarchyResolver};

/// Resolves contextual overrides along role chains.
#[derive(Clone)]
pub struct ContextualPermissionResolver {
    hierarchy: RoleHierarchyResolver,
    repository: Arc<dyn ContextualPermissionRepository>,
}

impl ContextualPermissionResolver {
    /// Creates a resolver over the given hierarchy and override store.
    #[must_use]
    pub fn new(
        hierarchy: RoleHierarchyResolver,
        repository: Arc<dyn ContextualPermissionRepository>,
    ) -> Self {
        Self {
            hierarchy,
            repository,
        }
    }

    /// Returns the winning override per (resource, action) for one role.
    pub async fn effective_contextual_permissions(
        &self,
        role_name: &RoleName,
        context: Option<&PermissionContext>,
    ) -> AppResult<Vec<ContextualEffect>> {
        let chain = self.hierarchy.effective_roles(role_name).await?;
        self.resolve_for_chain(&chain, context).await
    }

    /// Returns the winning override per (resource, action) for an already
    /// expanded role set.
    pub async fn resolve_for_chain(
        &self,
        chain: &[EffectiveRole],
        context: Option<&PermissionContext>,
    ) -> AppResult<Vec<ContextualEffect>> {
        if chain.is_empty() {
            return Ok(Vec::new());
        }

        let entries = self.applicable_overrides(chain, context).await?;

        Ok(resolve_contextual_permissions(chain, &entries, context))
    }

    /// Returns every live override attached to a role of `chain` that
    /// applies in `context`, without resolving conflicts between them.
    pub async fn applicable_overrides(
        &self,
        chain: &[EffectiveRole],
        context: Option<&PermissionContext>,
    ) -> AppResult<Vec<ContextualPermission>> {
        if chain.is_empty() {
            return Ok(Vec::new());
        }

        let role_ids: Vec<RoleId> = chain.iter().map(|entry| entry.role.id()).collect();
        let mut entries = self.repository.list_for_roles(&role_ids, context).await?;
        entries.retain(|entry| entry.applies_to(context) && role_ids.contains(&entry.role_id()));

        Ok(entries)
    }
}
