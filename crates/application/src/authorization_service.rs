use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;
use warden_core::{AppError, AppResult, OrganizationId};
use warden_domain::{EffectiveRole, PermissionContext, RoleId, RoleName};

use crate::{
    ContextualPermissionResolver, PolicyMatcher, RoleAssignmentRepository, RoleHierarchyResolver,
    RoleRepository,
};

/// Step of the decision pipeline that produced an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    /// An explicit contextual deny matched.
    ContextualDeny,
    /// An explicit contextual allow matched.
    ContextualAllow,
    /// A policy grant matched.
    PolicyGrant,
    /// Nothing matched.
    NoGrant,
}

/// Outcome of one authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccessDecision {
    allowed: bool,
    source: DecisionSource,
}

impl AccessDecision {
    fn new(source: DecisionSource) -> Self {
        let allowed = matches!(
            source,
            DecisionSource::ContextualAllow | DecisionSource::PolicyGrant
        );
        Self { allowed, source }
    }

    /// Returns whether access is allowed.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        self.allowed
    }

    /// Returns the pipeline step that decided.
    #[must_use]
    pub fn source(&self) -> DecisionSource {
        self.source
    }
}

/// Application service answering (subject, resource, action, organization) checks.
#[derive(Clone)]
pub struct AuthorizationService {
    roles: Arc<dyn RoleRepository>,
    assignments: Arc<dyn RoleAssignmentRepository>,
    hierarchy: RoleHierarchyResolver,
    contextual: ContextualPermissionResolver,
    matcher: Arc<dyn PolicyMatcher>,
}

impl AuthorizationService {
    /// Creates a new authorization service from its collaborators.
    #[must_use]
    pub fn new(
        roles: Arc<dyn RoleRepository>,
        assignments: Arc<dyn RoleAssignmentRepository>,
        hierarchy: RoleHierarchyResolver,
        contextual: ContextualPermissionResolver,
        matcher: Arc<dyn PolicyMatcher>,
    ) -> Self {
        Self {
            roles,
            assignments,
            hierarchy,
            contextual,
            matcher,
        }
    }

    /// Decides whether `subject` may perform `action` on `resource`.
    ///
    /// A contextual deny on any effective role wins over contextual allows,
    /// which win over policy grants. A deny is a normal outcome, not an error.
    pub async fn authorize(
        &self,
        subject: &str,
        resource: &str,
        action: &str,
        org_id: Option<OrganizationId>,
    ) -> AppResult<AccessDecision> {
        let roles = self.effective_roles_for_subject(subject, org_id).await?;
        let decision = self.decide(&roles, resource, action, org_id).await?;

        debug!(
            subject,
            resource,
            action,
            org_id = ?org_id,
            allowed = decision.is_allowed(),
            source = ?decision.source(),
            "authorization decided"
        );

        Ok(decision)
    }

    /// Returns whether the check is allowed.
    pub async fn check_permission(
        &self,
        subject: &str,
        resource: &str,
        action: &str,
        org_id: Option<OrganizationId>,
    ) -> AppResult<bool> {
        Ok(self
            .authorize(subject, resource, action, org_id)
            .await?
            .is_allowed())
    }

    /// Ensures the check is allowed, failing with `PermissionDenied` otherwise.
    pub async fn require_permission(
        &self,
        subject: &str,
        resource: &str,
        action: &str,
        org_id: Option<OrganizationId>,
    ) -> AppResult<()> {
        if self.check_permission(subject, resource, action, org_id).await? {
            return Ok(());
        }

        let scope = org_id.map_or_else(
            || "global scope".to_owned(),
            |org_id| format!("organization '{org_id}'"),
        );
        Err(AppError::PermissionDenied(format!(
            "subject '{subject}' may not '{action}' on '{resource}' in {scope}"
        )))
    }

    /// Returns the subject's direct and inherited active roles.
    ///
    /// Tenant-scoped roles only participate when `org_id` is their tenant.
    /// A role reached along several chains keeps its smallest distance.
    pub async fn effective_roles_for_subject(
        &self,
        subject: &str,
        org_id: Option<OrganizationId>,
    ) -> AppResult<Vec<EffectiveRole>> {
        let assigned = self.assignments.list_roles_for_subject(subject).await?;
        let mut merged: HashMap<RoleId, EffectiveRole> = HashMap::new();

        for role_name in assigned {
            let Some(role) = self.roles.find_role_by_name(&role_name).await? else {
                continue;
            };

            if !role.applies_in(org_id) {
                continue;
            }

            for entry in self.hierarchy.expand(role).await? {
                if !entry.role.applies_in(org_id) {
                    continue;
                }

                let distance = entry.distance;
                merged
                    .entry(entry.role.id())
                    .and_modify(|current| current.distance = current.distance.min(distance))
                    .or_insert(entry);
            }
        }

        let mut roles: Vec<EffectiveRole> = merged.into_values().collect();
        roles.sort_by(|left, right| {
            left.distance
                .cmp(&right.distance)
                .then_with(|| left.role.name().cmp(right.role.name()))
        });

        Ok(roles)
    }

    async fn decide(
        &self,
        roles: &[EffectiveRole],
        resource: &str,
        action: &str,
        org_id: Option<OrganizationId>,
    ) -> AppResult<AccessDecision> {
        if let Some(org_id) = org_id {
            let context = PermissionContext::organization(org_id);
            let overrides = self
                .contextual
                .applicable_overrides(roles, Some(&context))
                .await?;
            let matching: Vec<_> = overrides
                .iter()
                .filter(|entry| entry.covers(resource, action))
                .collect();

            // A deny on any effective role wins, however far it sits.
            if matching.iter().any(|entry| !entry.is_granted()) {
                return Ok(AccessDecision::new(DecisionSource::ContextualDeny));
            }

            if matching.iter().any(|entry| entry.is_granted()) {
                return Ok(AccessDecision::new(DecisionSource::ContextualAllow));
            }
        }

        let role_names: Vec<RoleName> = roles
            .iter()
            .map(|entry| entry.role.name().clone())
            .collect();
        if !role_names.is_empty()
            && self
                .matcher
                .has_permission(&role_names, resource, action)
                .await?
        {
            return Ok(AccessDecision::new(DecisionSource::PolicyGrant));
        }

        Ok(AccessDecision::new(DecisionSource::NoGrant))
    }
}

#[cfg(test)]
mod tests;
