//! In-memory implementation of every access-control repository port.
//!
//! All state sits behind one `RwLock`, so each port call is a single atomic
//! unit: a mutation either applies completely or leaves the state untouched.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use warden_application::{RoleDeletion, RoleRepository};
use warden_core::{AppError, AppResult, OrganizationId};
use warden_domain::{
    ContextualPermission, EffectiveRole, HierarchyEdge, HierarchyPlan, HierarchySnapshot,
    Invitation, Membership, Organization, PermissionGrant, Role, RoleId, RoleName,
};

mod contextual;
mod grants;
mod invitations;
mod organizations;

#[derive(Debug, Default)]
struct AccessState {
    roles: BTreeMap<RoleId, Role>,
    closure: BTreeSet<HierarchyEdge>,
    grants: BTreeSet<PermissionGrant>,
    assignments: BTreeMap<(String, RoleName), DateTime<Utc>>,
    contextual_permissions: Vec<ContextualPermission>,
    organizations: Vec<Organization>,
    memberships: Vec<Membership>,
    invitations: Vec<Invitation>,
}

impl AccessState {
    fn live_role(&self, role_id: RoleId) -> Option<&Role> {
        self.roles.get(&role_id).filter(|role| role.is_visible())
    }

    fn live_role_by_name(&self, name: &RoleName) -> Option<&Role> {
        self.roles
            .values()
            .find(|role| role.is_visible() && role.name() == name)
    }

    fn snapshot(&self) -> HierarchySnapshot {
        HierarchySnapshot::from_roles(self.roles.values())
    }

    /// Inserts a new role together with its closure rows.
    ///
    /// The level is derived from the live parent read under the lock.
    fn insert_role(&mut self, role: Role, max_depth: usize) -> AppResult<Role> {
        if self.live_role_by_name(role.name()).is_some() {
            return Err(AppError::DuplicateName(format!(
                "role '{}' already exists",
                role.name()
            )));
        }

        let role = match role.parent_role_id() {
            Some(parent_id) => {
                let parent = self.live_role(parent_id).ok_or_else(|| {
                    AppError::NotFound(format!("parent role '{parent_id}' was not found"))
                })?;
                role.with_parent(parent)?
            }
            None => role,
        };
        role.ensure_depth_within(max_depth)?;

        let mut edges = vec![HierarchyEdge {
            ancestor: role.id(),
            descendant: role.id(),
            depth: 0,
        }];
        if let Some(parent_id) = role.parent_role_id() {
            edges.extend(
                self.closure
                    .iter()
                    .filter(|edge| edge.descendant == parent_id)
                    .map(|edge| HierarchyEdge {
                        ancestor: edge.ancestor,
                        descendant: role.id(),
                        depth: edge.depth.saturating_add(1),
                    }),
            );
        }

        self.closure.extend(edges);
        self.roles.insert(role.id(), role.clone());
        Ok(role)
    }

    /// Applies pointer, level and closure changes of a hierarchy plan.
    fn apply_plan(&mut self, plan: &HierarchyPlan, updated_at: DateTime<Utc>) {
        let levels: BTreeMap<RoleId, u32> = plan.levels.iter().copied().collect();

        for (role_id, parent_role_id) in &plan.parent_changes {
            if let Some(role) = self.roles.get_mut(role_id) {
                let level = levels.get(role_id).copied().unwrap_or_default();
                role.adopt_parent(*parent_role_id, level, updated_at);
            }
        }
        for (role_id, level) in &levels {
            if let Some(role) = self.roles.get_mut(role_id) {
                role.set_hierarchy_level(*level);
            }
        }

        let affected: BTreeSet<RoleId> = plan.affected.iter().copied().collect();
        self.closure
            .retain(|edge| !affected.contains(&edge.descendant));
        self.closure.extend(plan.edges.iter().copied());
    }

    fn effective_roles(
        &self,
        entries: impl IntoIterator<Item = (RoleId, u32)>,
    ) -> Vec<EffectiveRole> {
        entries
            .into_iter()
            .filter_map(|(role_id, distance)| {
                self.live_role(role_id).map(|role| EffectiveRole {
                    role: role.clone(),
                    distance,
                })
            })
            .collect()
    }
}

/// Process-local store backing every repository port.
#[derive(Debug, Default)]
pub struct InMemoryAccessStore {
    state: RwLock<AccessState>,
}

impl InMemoryAccessStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoleRepository for InMemoryAccessStore {
    async fn create_role(&self, role: Role, max_depth: usize) -> AppResult<Role> {
        self.state.write().await.insert_role(role, max_depth)
    }

    async fn save_role(&self, role: &Role) -> AppResult<()> {
        let mut state = self.state.write().await;
        let stored = state
            .roles
            .get_mut(&role.id())
            .filter(|stored| stored.is_visible())
            .ok_or_else(|| AppError::NotFound(format!("role '{}' was not found", role.id())))?;

        *stored = role.clone();
        Ok(())
    }

    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<Role>> {
        Ok(self.state.read().await.live_role(role_id).cloned())
    }

    async fn find_role_by_name(&self, name: &RoleName) -> AppResult<Option<Role>> {
        Ok(self.state.read().await.live_role_by_name(name).cloned())
    }

    async fn list_roles(&self, org_id: Option<OrganizationId>) -> AppResult<Vec<Role>> {
        let state = self.state.read().await;
        let mut roles: Vec<Role> = state
            .roles
            .values()
            .filter(|role| role.is_visible())
            .filter(|role| org_id.is_none() || role.applies_in(org_id))
            .cloned()
            .collect();
        roles.sort_by(|left, right| left.name().cmp(right.name()));

        Ok(roles)
    }

    async fn delete_role(
        &self,
        role_id: RoleId,
        deleted_at: DateTime<Utc>,
    ) -> AppResult<RoleDeletion> {
        let mut state = self.state.write().await;
        let role = state
            .live_role(role_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' was not found")))?;
        role.ensure_mutable()?;

        let plan = state.snapshot().plan_removal(role_id)?;

        if let Some(stored) = state.roles.get_mut(&role_id) {
            stored.mark_deleted(deleted_at)?;
        }
        state
            .closure
            .retain(|edge| edge.ancestor != role_id && edge.descendant != role_id);
        state.apply_plan(&plan, deleted_at);

        let removed_grants: Vec<PermissionGrant> = state
            .grants
            .iter()
            .filter(|grant| grant.role() == role.name())
            .cloned()
            .collect();
        state.grants.retain(|grant| grant.role() != role.name());

        let before = state.assignments.len();
        state
            .assignments
            .retain(|(_, role_name), _| role_name != role.name());
        let removed_assignments =
            u64::try_from(before - state.assignments.len()).unwrap_or(u64::MAX);

        let mut removed_contextual_permissions = 0_u64;
        for permission in state
            .contextual_permissions
            .iter_mut()
            .filter(|permission| permission.role_id() == role_id)
            .filter(|permission| permission.lifecycle().is_live())
        {
            permission.mark_deleted(deleted_at);
            removed_contextual_permissions += 1;
        }

        Ok(RoleDeletion {
            removed_grants,
            removed_assignments,
            removed_contextual_permissions,
            hierarchy: plan,
        })
    }

    async fn set_role_parent(
        &self,
        role_id: RoleId,
        parent_role_id: Option<RoleId>,
        max_depth: usize,
        updated_at: DateTime<Utc>,
    ) -> AppResult<HierarchyPlan> {
        let mut state = self.state.write().await;
        let plan = state
            .snapshot()
            .plan_reparent(role_id, parent_role_id, max_depth)?;
        state.apply_plan(&plan, updated_at);

        Ok(plan)
    }

    async fn list_ancestors(&self, role_id: RoleId) -> AppResult<Vec<EffectiveRole>> {
        let state = self.state.read().await;
        let mut edges: Vec<&HierarchyEdge> = state
            .closure
            .iter()
            .filter(|edge| edge.descendant == role_id && edge.depth > 0)
            .collect();
        edges.sort_by_key(|edge| edge.depth);

        Ok(state.effective_roles(edges.into_iter().map(|edge| (edge.ancestor, edge.depth))))
    }

    async fn list_descendants(&self, role_id: RoleId) -> AppResult<Vec<EffectiveRole>> {
        let state = self.state.read().await;
        let edges: Vec<(RoleId, u32)> = state
            .closure
            .iter()
            .filter(|edge| edge.ancestor == role_id && edge.depth > 0)
            .map(|edge| (edge.descendant, edge.depth))
            .collect();

        let mut descendants = state.effective_roles(edges);
        descendants.sort_by(|left, right| {
            left.distance
                .cmp(&right.distance)
                .then_with(|| left.role.name().cmp(right.role.name()))
        });

        Ok(descendants)
    }
}
