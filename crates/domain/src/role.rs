use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use warden_core::{AppError, AppResult, NonEmptyString, OrganizationId};

use crate::Lifecycle;

/// Maximum accepted role name length.
pub const ROLE_NAME_MAX_LENGTH: usize = 100;

/// Suffix reserved for the per-organization administrator roles.
pub const TENANT_ADMIN_ROLE_SUFFIX: &str = ":admin";

/// Stable identifier of a role row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleId(Uuid);

impl RoleId {
    /// Creates a random role identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a role identifier from an existing UUID value.
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

impl Default for RoleId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RoleId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Validated role name.
///
/// Names are trimmed, at most [`ROLE_NAME_MAX_LENGTH`] characters and limited
/// to ASCII alphanumerics plus `-`, `_`, `.` and `:`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleName(String);

impl RoleName {
    /// Creates a validated role name.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let trimmed = value.trim();

        if trimmed.is_empty() {
            return Err(AppError::Validation(
                "role name must not be empty".to_owned(),
            ));
        }

        if trimmed.len() > ROLE_NAME_MAX_LENGTH {
            return Err(AppError::Validation(format!(
                "role name must not exceed {ROLE_NAME_MAX_LENGTH} characters"
            )));
        }

        if let Some(invalid) = trimmed
            .chars()
            .find(|character| !is_role_name_character(*character))
        {
            return Err(AppError::Validation(format!(
                "role name '{trimmed}' contains invalid character '{invalid}'"
            )));
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the validated name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns whether the name sits in the tenant administrator namespace.
    #[must_use]
    pub fn is_tenant_admin(&self) -> bool {
        self.0.ends_with(TENANT_ADMIN_ROLE_SUFFIX)
    }
}

impl Display for RoleName {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

impl From<RoleName> for String {
    fn from(value: RoleName) -> Self {
        value.0
    }
}

fn is_role_name_character(character: char) -> bool {
    character.is_ascii_alphanumeric() || matches!(character, '-' | '_' | '.' | ':')
}

/// Persisted role fields used to rehydrate a [`Role`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleParts {
    /// Stable identifier.
    pub id: RoleId,
    /// Unique name among live roles.
    pub name: RoleName,
    /// Human-friendly name.
    pub display_name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Built-in protected role.
    pub is_system: bool,
    /// Whether the role may be assigned and granted.
    pub is_active: bool,
    /// Single parent pointer.
    pub parent_role_id: Option<RoleId>,
    /// Number of ancestors.
    pub hierarchy_level: u32,
    /// Owning organization; `None` for global roles.
    pub org_id: Option<OrganizationId>,
    /// Soft-deletion state.
    pub lifecycle: Lifecycle,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Partial update applied by administrators.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleUpdate {
    /// New display name.
    pub display_name: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New active flag.
    pub is_active: Option<bool>,
}

impl RoleUpdate {
    /// Returns whether the update changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.description.is_none() && self.is_active.is_none()
    }
}

/// Role aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    id: RoleId,
    name: RoleName,
    display_name: NonEmptyString,
    description: Option<String>,
    is_system: bool,
    is_active: bool,
    parent_role_id: Option<RoleId>,
    hierarchy_level: u32,
    org_id: Option<OrganizationId>,
    lifecycle: Lifecycle,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Role {
    /// Creates a new active, custom, root role.
    pub fn new(
        name: RoleName,
        display_name: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> AppResult<Self> {
        Ok(Self {
            id: RoleId::new(),
            name,
            display_name: NonEmptyString::new(display_name.into().trim())?,
            description: None,
            is_system: false,
            is_active: true,
            parent_role_id: None,
            hierarchy_level: 0,
            org_id: None,
            lifecycle: Lifecycle::Live,
            created_at,
            updated_at: created_at,
        })
    }

    /// Rehydrates a role from persisted fields.
    pub fn from_parts(parts: RoleParts) -> AppResult<Self> {
        Ok(Self {
            id: parts.id,
            name: parts.name,
            display_name: NonEmptyString::new(parts.display_name)?,
            description: parts.description,
            is_system: parts.is_system,
            is_active: parts.is_active,
            parent_role_id: parts.parent_role_id,
            hierarchy_level: parts.hierarchy_level,
            org_id: parts.org_id,
            lifecycle: parts.lifecycle,
            created_at: parts.created_at,
            updated_at: parts.updated_at,
        })
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = normalize_description(description);
        self
    }

    /// Sets the initial active flag.
    #[must_use]
    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }

    /// Marks the role as a protected built-in role.
    #[must_use]
    pub fn into_system(mut self) -> Self {
        self.is_system = true;
        self
    }

    /// Scopes the role to one organization.
    #[must_use]
    pub fn scoped_to(mut self, org_id: OrganizationId) -> Self {
        self.org_id = Some(org_id);
        self
    }

    /// Attaches the role below `parent` at creation time.
    ///
    /// The parent must be visible and belong to a compatible scope.
    pub fn with_parent(mut self, parent: &Role) -> AppResult<Self> {
        ensure_parent_scope(&self, parent)?;
        self.parent_role_id = Some(parent.id);
        self.hierarchy_level = parent.hierarchy_level.saturating_add(1);
        Ok(self)
    }

    /// Fails with `HierarchyTooDeep` when the level exceeds `max_depth`.
    pub fn ensure_depth_within(&self, max_depth: usize) -> AppResult<()> {
        let within = usize::try_from(self.hierarchy_level).is_ok_and(|level| level <= max_depth);
        if within {
            Ok(())
        } else {
            Err(AppError::HierarchyTooDeep { max_depth })
        }
    }

    /// Returns the stable identifier.
    #[must_use]
    pub fn id(&self) -> RoleId {
        self.id
    }

    /// Returns the unique name.
    #[must_use]
    pub fn name(&self) -> &RoleName {
        &self.name
    }

    /// Returns the display name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.display_name.as_str()
    }

    /// Returns the optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns whether this is a protected built-in role.
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.is_system
    }

    /// Returns the active flag.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Returns the parent pointer.
    #[must_use]
    pub fn parent_role_id(&self) -> Option<RoleId> {
        self.parent_role_id
    }

    /// Returns the number of ancestors.
    #[must_use]
    pub fn hierarchy_level(&self) -> u32 {
        self.hierarchy_level
    }

    /// Returns the owning organization, `None` for global roles.
    #[must_use]
    pub fn org_id(&self) -> Option<OrganizationId> {
        self.org_id
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

    /// Returns the last mutation timestamp.
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns whether lookups may see the role.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.lifecycle.is_live()
    }

    /// Returns whether the role participates in checks scoped to `org_id`.
    ///
    /// Global roles participate everywhere; tenant roles only in their tenant.
    #[must_use]
    pub fn applies_in(&self, org_id: Option<OrganizationId>) -> bool {
        match self.org_id {
            None => true,
            Some(role_org_id) => org_id == Some(role_org_id),
        }
    }

    /// Ensures the role may receive grants and assignments.
    pub fn ensure_assignable(&self) -> AppResult<()> {
        if !self.is_visible() {
            return Err(AppError::NotFound(format!(
                "role '{}' was not found",
                self.name
            )));
        }

        if !self.is_active {
            return Err(AppError::RoleInactive(self.name.to_string()));
        }

        Ok(())
    }

    /// Ensures the role is not a protected built-in role.
    pub fn ensure_mutable(&self) -> AppResult<()> {
        if self.is_system {
            return Err(AppError::SystemRoleImmutable(self.name.to_string()));
        }

        Ok(())
    }

    /// Applies an administrative update.
    pub fn apply_update(&mut self, update: RoleUpdate, updated_at: DateTime<Utc>) -> AppResult<()> {
        self.ensure_mutable()?;

        if let Some(display_name) = update.display_name {
            self.display_name = NonEmptyString::new(display_name.trim())?;
        }

        if update.description.is_some() {
            self.description = normalize_description(update.description);
        }

        if let Some(is_active) = update.is_active {
            self.is_active = is_active;
        }

        self.updated_at = updated_at;
        Ok(())
    }

    /// Checks the attribute rules for moving the role below `parent`.
    ///
    /// Cycle and depth checks belong to
    /// [`crate::HierarchySnapshot::plan_reparent`].
    pub fn ensure_can_reparent(&self, parent: Option<&Role>) -> AppResult<()> {
        self.ensure_mutable()?;
        match parent {
            Some(parent) => ensure_parent_scope(self, parent),
            None => Ok(()),
        }
    }

    /// Rewrites the parent pointer and level from a hierarchy plan.
    pub fn adopt_parent(
        &mut self,
        parent_role_id: Option<RoleId>,
        hierarchy_level: u32,
        updated_at: DateTime<Utc>,
    ) {
        self.parent_role_id = parent_role_id;
        self.hierarchy_level = hierarchy_level;
        self.updated_at = updated_at;
    }

    /// Updates the informational hierarchy level.
    pub fn set_hierarchy_level(&mut self, hierarchy_level: u32) {
        self.hierarchy_level = hierarchy_level;
    }

    /// Tombstones the role.
    pub fn mark_deleted(&mut self, deleted_at: DateTime<Utc>) -> AppResult<()> {
        self.ensure_mutable()?;
        self.lifecycle = Lifecycle::Deleted { deleted_at };
        self.updated_at = deleted_at;
        Ok(())
    }
}

fn normalize_description(description: Option<String>) -> Option<String> {
    description
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn ensure_parent_scope(child: &Role, parent: &Role) -> AppResult<()> {
    if !parent.is_visible() {
        return Err(AppError::NotFound(format!(
            "parent role '{}' was not found",
            parent.name
        )));
    }

    match (child.org_id, parent.org_id) {
        (_, None) => Ok(()),
        (Some(child_org), Some(parent_org)) if child_org == parent_org => Ok(()),
        _ => Err(AppError::Validation(format!(
            "role '{}' cannot inherit from role '{}' scoped to another organization",
            child.name, parent.name
        ))),
    }
}
