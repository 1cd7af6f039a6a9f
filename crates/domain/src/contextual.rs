use std::collections::{BTreeMap, HashMap};
use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use warden_core::{AppError, AppResult, OrganizationId};

use crate::{EffectiveRole, Lifecycle, PolicyTerm, RoleId};

/// Context type used for organization-scoped overrides.
pub const ORGANIZATION_CONTEXT: &str = "organization";

/// Stable identifier of a contextual permission row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContextualPermissionId(Uuid);

impl ContextualPermissionId {
    /// Creates a random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ContextualPermissionId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ContextualPermissionId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Open (type, value) pair an override is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PermissionContext {
    context_type: String,
    context_value: String,
}

impl PermissionContext {
    /// Creates a context; the type is normalized to lower case.
    pub fn new(context_type: &str, context_value: &str) -> AppResult<Self> {
        let context_type = context_type.trim().to_lowercase();
        let context_value = context_value.trim();

        if context_type.is_empty() || context_value.is_empty() {
            return Err(AppError::Validation(
                "context type and value must not be empty".to_owned(),
            ));
        }

        Ok(Self {
            context_type,
            context_value: context_value.to_owned(),
        })
    }

    /// Builds the context for checks inside one organization.
    #[must_use]
    pub fn organization(org_id: OrganizationId) -> Self {
        Self {
            context_type: ORGANIZATION_CONTEXT.to_owned(),
            context_value: org_id.to_string(),
        }
    }

    /// Returns the normalized context type.
    #[must_use]
    pub fn context_type(&self) -> &str {
        self.context_type.as_str()
    }

    /// Returns the context value.
    #[must_use]
    pub fn context_value(&self) -> &str {
        self.context_value.as_str()
    }
}

/// Allow or deny override bound to a role and an optional context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextualPermission {
    id: ContextualPermissionId,
    role_id: RoleId,
    resource: PolicyTerm,
    action: PolicyTerm,
    context: Option<PermissionContext>,
    is_granted: bool,
    lifecycle: Lifecycle,
    created_at: DateTime<Utc>,
}

impl ContextualPermission {
    /// Creates a live override.
    #[must_use]
    pub fn new(
        role_id: RoleId,
        resource: PolicyTerm,
        action: PolicyTerm,
        context: Option<PermissionContext>,
        is_granted: bool,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ContextualPermissionId::new(),
            role_id,
            resource,
            action,
            context,
            is_granted,
            lifecycle: Lifecycle::Live,
            created_at,
        }
    }

    /// Rehydrates an override from storage.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn restore(
        id: ContextualPermissionId,
        role_id: RoleId,
        resource: PolicyTerm,
        action: PolicyTerm,
        context: Option<PermissionContext>,
        is_granted: bool,
        lifecycle: Lifecycle,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            role_id,
            resource,
            action,
            context,
            is_granted,
            lifecycle,
            created_at,
        }
    }

    /// Returns the identifier.
    #[must_use]
    pub fn id(&self) -> ContextualPermissionId {
        self.id
    }

    /// Returns the owning role.
    #[must_use]
    pub fn role_id(&self) -> RoleId {
        self.role_id
    }

    /// Returns the resource term.
    #[must_use]
    pub fn resource(&self) -> &PolicyTerm {
        &self.resource
    }

    /// Returns the action term.
    #[must_use]
    pub fn action(&self) -> &PolicyTerm {
        &self.action
    }

    /// Returns the scoping context, `None` when universal.
    #[must_use]
    pub fn context(&self) -> Option<&PermissionContext> {
        self.context.as_ref()
    }

    /// Returns whether this is an allow (`true`) or a deny (`false`).
    #[must_use]
    pub fn is_granted(&self) -> bool {
        self.is_granted
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns whether the override's terms cover the request.
    #[must_use]
    pub fn covers(&self, resource: &str, action: &str) -> bool {
        self.resource.matches(resource) && self.action.matches(action)
    }

    /// Returns whether two overrides collide on the uniqueness key.
    #[must_use]
    pub fn same_key(&self, other: &Self) -> bool {
        self.role_id == other.role_id
            && self.resource == other.resource
            && self.action == other.action
            && self.context == other.context
    }

    /// Returns whether the override participates for `context`.
    #[must_use]
    pub fn applies_to(&self, context: Option<&PermissionContext>) -> bool {
        if !self.lifecycle.is_live() {
            return false;
        }

        match &self.context {
            None => true,
            Some(own) => context == Some(own),
        }
    }

    /// Tombstones the override.
    pub fn mark_deleted(&mut self, deleted_at: DateTime<Utc>) {
        self.lifecycle = Lifecycle::Deleted { deleted_at };
    }
}

/// Resolved allow/deny for one (resource, action) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextualEffect {
    /// Resource term.
    pub resource: PolicyTerm,
    /// Action term.
    pub action: PolicyTerm,
    /// Allow (`true`) or deny (`false`).
    pub is_granted: bool,
    /// Role the winning override is attached to.
    pub role_id: RoleId,
    /// Distance of that role from the role the chain started at.
    pub distance: u32,
}

impl ContextualEffect {
    /// Returns whether the effect covers the request.
    #[must_use]
    pub fn covers(&self, resource: &str, action: &str) -> bool {
        self.resource.matches(resource) && self.action.matches(action)
    }
}

/// Resolves overrides along one or more role chains.
///
/// For each (resource, action) pair the override on the nearest role wins;
/// at equal distance a deny wins over an allow. Roles absent from `chain`
/// and overrides outside `context` are ignored.
#[must_use]
pub fn resolve_contextual_permissions(
    chain: &[EffectiveRole],
    entries: &[ContextualPermission],
    context: Option<&PermissionContext>,
) -> Vec<ContextualEffect> {
    let mut distances: HashMap<RoleId, u32> = HashMap::new();
    for entry in chain {
        distances
            .entry(entry.role.id())
            .and_modify(|distance| *distance = (*distance).min(entry.distance))
            .or_insert(entry.distance);
    }

    let mut winners: BTreeMap<(PolicyTerm, PolicyTerm), ContextualEffect> = BTreeMap::new();
    for entry in entries.iter().filter(|entry| entry.applies_to(context)) {
        let Some(distance) = distances.get(&entry.role_id).copied() else {
            continue;
        };

        let candidate = ContextualEffect {
            resource: entry.resource.clone(),
            action: entry.action.clone(),
            is_granted: entry.is_granted,
            role_id: entry.role_id,
            distance,
        };

        winners
            .entry((entry.resource.clone(), entry.action.clone()))
            .and_modify(|current| {
                if outranks(&candidate, current) {
                    *current = candidate.clone();
                }
            })
            .or_insert_with(|| candidate.clone());
    }

    winners.into_values().collect()
}

fn outranks(candidate: &ContextualEffect, current: &ContextualEffect) -> bool {
    candidate.distance < current.distance
        || (candidate.distance == current.distance && !candidate.is_granted && current.is_granted)
}
