//! Role inheritance: bounded ancestor walks and closure maintenance.
//!
//! The hierarchy is a forest of single parent pointers. Reads walk the
//! pointers with a visited set and a depth bound; writes go through a
//! [`HierarchySnapshot`] plan so the pointer, the levels of the moved subtree
//! and its closure rows change together.

use std::collections::{BTreeMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use warden_core::{AppError, AppResult};

use crate::{Role, RoleId};

/// Default maximum number of ancestors a role may have.
pub const DEFAULT_MAX_HIERARCHY_DEPTH: usize = 10;

/// Role reached while expanding a hierarchy chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveRole {
    /// Resolved role.
    pub role: Role,
    /// Number of parent hops from the starting role.
    pub distance: u32,
}

/// Materialized closure row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HierarchyEdge {
    /// Ancestor role, or the role itself for the reflexive row.
    pub ancestor: RoleId,
    /// Descendant role.
    pub descendant: RoleId,
    /// Number of hops between the two roles.
    pub depth: u32,
}

/// Incremental parent-pointer walk used when roles are loaded one at a time.
#[derive(Debug)]
pub struct AncestorWalk {
    max_depth: usize,
    visited: HashSet<RoleId>,
    chain: Vec<EffectiveRole>,
}

impl AncestorWalk {
    /// Starts a walk at `role` (distance zero).
    #[must_use]
    pub fn start(role: Role, max_depth: usize) -> Self {
        let mut visited = HashSet::new();
        visited.insert(role.id());

        Self {
            max_depth,
            visited,
            chain: vec![EffectiveRole { role, distance: 0 }],
        }
    }

    /// Returns the parent pointer of the last role reached.
    #[must_use]
    pub fn next_parent(&self) -> Option<RoleId> {
        self.chain
            .last()
            .and_then(|entry| entry.role.parent_role_id())
    }

    /// Appends the next ancestor.
    pub fn push(&mut self, parent: Role) -> AppResult<()> {
        if !self.visited.insert(parent.id()) {
            return Err(AppError::CyclicHierarchy(format!(
                "role '{}' is reachable from itself",
                parent.name()
            )));
        }

        let distance = self.chain.len();
        if distance > self.max_depth {
            return Err(AppError::HierarchyTooDeep {
                max_depth: self.max_depth,
            });
        }

        self.chain.push(EffectiveRole {
            role: parent,
            distance: u32::try_from(distance).map_err(|error| {
                AppError::Internal(format!("hierarchy distance overflow: {error}"))
            })?,
        });
        Ok(())
    }

    /// Finishes the walk, dropping inactive roles.
    ///
    /// Inactive roles still carry the structural pointer, so the walk passes
    /// through them.
    #[must_use]
    pub fn finish(self) -> Vec<EffectiveRole> {
        self.chain
            .into_iter()
            .filter(|entry| entry.role.is_active())
            .collect()
    }
}

/// Pointer and closure changes computed for one hierarchy mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HierarchyPlan {
    /// Parent pointers to rewrite.
    pub parent_changes: Vec<(RoleId, Option<RoleId>)>,
    /// Roles whose closure rows must be replaced by `edges`.
    pub affected: Vec<RoleId>,
    /// New hierarchy level per affected role.
    pub levels: Vec<(RoleId, u32)>,
    /// Complete closure rows for every affected role, reflexive rows included.
    pub edges: Vec<HierarchyEdge>,
}

/// In-memory view of the parent pointers of all live roles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HierarchySnapshot {
    parents: BTreeMap<RoleId, Option<RoleId>>,
}

impl HierarchySnapshot {
    /// Builds a snapshot from visible roles.
    pub fn from_roles<'a>(roles: impl IntoIterator<Item = &'a Role>) -> Self {
        let parents = roles
            .into_iter()
            .filter(|role| role.is_visible())
            .map(|role| (role.id(), role.parent_role_id()))
            .collect();

        Self { parents }
    }

    /// Records or replaces one role pointer.
    pub fn insert(&mut self, role_id: RoleId, parent_role_id: Option<RoleId>) {
        self.parents.insert(role_id, parent_role_id);
    }

    /// Returns whether the role is part of the snapshot.
    #[must_use]
    pub fn contains(&self, role_id: RoleId) -> bool {
        self.parents.contains_key(&role_id)
    }

    /// Returns the parent of a role.
    #[must_use]
    pub fn parent_of(&self, role_id: RoleId) -> Option<RoleId> {
        self.parents.get(&role_id).copied().flatten()
    }

    /// Returns ancestors nearest-first with their distance.
    ///
    /// A pointer to a role outside the snapshot ends the chain.
    pub fn ancestors(&self, role_id: RoleId) -> AppResult<Vec<(RoleId, u32)>> {
        let mut visited = HashSet::from([role_id]);
        let mut ancestors = Vec::new();
        let mut current = self.parent_of(role_id);
        let mut distance = 0_u32;

        while let Some(parent_id) = current {
            if !self.contains(parent_id) {
                break;
            }

            if !visited.insert(parent_id) {
                return Err(AppError::CyclicHierarchy(format!(
                    "role '{parent_id}' is reachable from itself"
                )));
            }

            distance = distance.saturating_add(1);
            ancestors.push((parent_id, distance));
            current = self.parent_of(parent_id);
        }

        Ok(ancestors)
    }

    /// Returns descendants breadth-first with their distance.
    #[must_use]
    pub fn descendants(&self, role_id: RoleId) -> Vec<(RoleId, u32)> {
        let mut children: BTreeMap<RoleId, Vec<RoleId>> = BTreeMap::new();
        for (child, parent) in &self.parents {
            if let Some(parent) = parent {
                children.entry(*parent).or_default().push(*child);
            }
        }

        let mut visited = HashSet::from([role_id]);
        let mut queue = VecDeque::from([(role_id, 0_u32)]);
        let mut descendants = Vec::new();

        while let Some((current, distance)) = queue.pop_front() {
            for child in children.get(&current).into_iter().flatten() {
                if visited.insert(*child) {
                    let child_distance = distance.saturating_add(1);
                    descendants.push((*child, child_distance));
                    queue.push_back((*child, child_distance));
                }
            }
        }

        descendants
    }

    /// Returns the full closure, reflexive rows included.
    pub fn closure(&self) -> AppResult<Vec<HierarchyEdge>> {
        let mut edges = Vec::new();
        for role_id in self.parents.keys() {
            edges.extend(self.closure_rows(*role_id)?);
        }

        Ok(edges)
    }

    /// Returns the hierarchy level of a role.
    pub fn level(&self, role_id: RoleId) -> AppResult<u32> {
        let ancestors = self.ancestors(role_id)?;
        u32::try_from(ancestors.len())
            .map_err(|error| AppError::Internal(format!("hierarchy level overflow: {error}")))
    }

    /// Plans moving `role_id` (with its subtree) below `new_parent`.
    pub fn plan_reparent(
        &self,
        role_id: RoleId,
        new_parent: Option<RoleId>,
        max_depth: usize,
    ) -> AppResult<HierarchyPlan> {
        if !self.contains(role_id) {
            return Err(AppError::NotFound(format!("role '{role_id}' was not found")));
        }

        let descendants = self.descendants(role_id);

        if let Some(parent_id) = new_parent {
            if parent_id == role_id {
                return Err(AppError::CyclicHierarchy(format!(
                    "role '{role_id}' cannot be its own parent"
                )));
            }

            if !self.contains(parent_id) {
                return Err(AppError::NotFound(format!(
                    "parent role '{parent_id}' was not found"
                )));
            }

            if descendants.iter().any(|(descendant, _)| *descendant == parent_id) {
                return Err(AppError::CyclicHierarchy(format!(
                    "role '{parent_id}' descends from role '{role_id}'"
                )));
            }
        }

        let new_level = match new_parent {
            Some(parent_id) => self.level(parent_id)?.saturating_add(1),
            None => 0,
        };
        let subtree_height = descendants
            .iter()
            .map(|(_, distance)| *distance)
            .max()
            .unwrap_or(0);
        let deepest = usize::try_from(new_level.saturating_add(subtree_height))
            .map_err(|error| AppError::Internal(format!("hierarchy depth overflow: {error}")))?;

        if deepest > max_depth {
            return Err(AppError::HierarchyTooDeep { max_depth });
        }

        let mut next = self.clone();
        next.insert(role_id, new_parent);

        let affected: Vec<RoleId> = std::iter::once(role_id)
            .chain(descendants.iter().map(|(descendant, _)| *descendant))
            .collect();

        next.plan_for(vec![(role_id, new_parent)], affected)
    }

    /// Plans removing `role_id`: its children move to its parent.
    pub fn plan_removal(&self, role_id: RoleId) -> AppResult<HierarchyPlan> {
        let grandparent = self.parent_of(role_id);
        let descendants = self.descendants(role_id);
        let children: Vec<RoleId> = descendants
            .iter()
            .filter(|(_, distance)| *distance == 1)
            .map(|(child, _)| *child)
            .collect();

        let mut next = self.clone();
        next.parents.remove(&role_id);
        for child in &children {
            next.insert(*child, grandparent);
        }

        let parent_changes = children.iter().map(|child| (*child, grandparent)).collect();
        let affected = descendants.into_iter().map(|(descendant, _)| descendant).collect();

        next.plan_for(parent_changes, affected)
    }

    /// Applies a plan's pointer changes to this snapshot.
    pub fn apply(&mut self, plan: &HierarchyPlan) {
        for (role_id, parent_role_id) in &plan.parent_changes {
            self.insert(*role_id, *parent_role_id);
        }
    }

    fn plan_for(
        &self,
        parent_changes: Vec<(RoleId, Option<RoleId>)>,
        affected: Vec<RoleId>,
    ) -> AppResult<HierarchyPlan> {
        let mut levels = Vec::with_capacity(affected.len());
        let mut edges = Vec::new();

        for role_id in &affected {
            levels.push((*role_id, self.level(*role_id)?));
            edges.extend(self.closure_rows(*role_id)?);
        }

        Ok(HierarchyPlan {
            parent_changes,
            affected,
            levels,
            edges,
        })
    }

    fn closure_rows(&self, role_id: RoleId) -> AppResult<Vec<HierarchyEdge>> {
        let mut rows = vec![HierarchyEdge {
            ancestor: role_id,
            descendant: role_id,
            depth: 0,
        }];

        rows.extend(
            self.ancestors(role_id)?
                .into_iter()
                .map(|(ancestor, depth)| HierarchyEdge {
                    ancestor,
                    descendant: role_id,
                    depth,
                }),
        );

        Ok(rows)
    }
}
