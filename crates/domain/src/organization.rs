use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use warden_core::{AppError, AppResult, NonEmptyString, OrganizationId};

use crate::{EmailAddress, Lifecycle, RoleName, TENANT_ADMIN_ROLE_SUFFIX};

/// Minimum organization slug length.
pub const SLUG_MIN_LENGTH: usize = 3;

/// Maximum organization slug length.
pub const SLUG_MAX_LENGTH: usize = 63;

/// URL-safe unique organization handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrganizationSlug(String);

impl OrganizationSlug {
    /// Creates a validated slug.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let trimmed = value.trim();
        let length = trimmed.len();

        if !(SLUG_MIN_LENGTH..=SLUG_MAX_LENGTH).contains(&length) {
            return Err(AppError::Validation(format!(
                "organization slug must be between {SLUG_MIN_LENGTH} and {SLUG_MAX_LENGTH} characters"
            )));
        }

        if !trimmed
            .chars()
            .all(|character| {
                character.is_ascii_lowercase() || character.is_ascii_digit() || character == '-'
            })
        {
            return Err(AppError::Validation(format!(
                "organization slug '{trimmed}' may only contain lowercase letters, digits and '-'"
            )));
        }

        if trimmed.starts_with('-') || trimmed.ends_with('-') {
            return Err(AppError::Validation(format!(
                "organization slug '{trimmed}' must not start or end with '-'"
            )));
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the slug value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the name of the tenant administrator role.
    pub fn admin_role_name(&self) -> AppResult<RoleName> {
        RoleName::new(format!("{}{TENANT_ADMIN_ROLE_SUFFIX}", self.0))
    }
}

impl Display for OrganizationSlug {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Subscription tier of an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    /// Free tier.
    Free,
    /// Pro tier.
    Pro,
    /// Team tier.
    Team,
    /// Enterprise tier.
    Enterprise,
}

impl PlanTier {
    /// Returns a stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Pro => "pro",
            Self::Team => "team",
            Self::Enterprise => "enterprise",
        }
    }
}

impl FromStr for PlanTier {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "free" => Ok(Self::Free),
            "pro" => Ok(Self::Pro),
            "team" => Ok(Self::Team),
            "enterprise" => Ok(Self::Enterprise),
            _ => Err(AppError::Validation(format!(
                "unknown plan tier '{value}'"
            ))),
        }
    }
}

/// Tenant aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    id: OrganizationId,
    slug: OrganizationSlug,
    name: NonEmptyString,
    plan_tier: PlanTier,
    is_active: bool,
    settings: Value,
    lifecycle: Lifecycle,
    created_at: DateTime<Utc>,
}

impl Organization {
    /// Creates a new active organization on the free tier.
    pub fn new(
        slug: OrganizationSlug,
        name: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> AppResult<Self> {
        Ok(Self {
            id: OrganizationId::new(),
            slug,
            name: NonEmptyString::new(name.into().trim())?,
            plan_tier: PlanTier::Free,
            is_active: true,
            settings: Value::Object(serde_json::Map::new()),
            lifecycle: Lifecycle::Live,
            created_at,
        })
    }

    /// Rehydrates an organization from storage.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: OrganizationId,
        slug: OrganizationSlug,
        name: String,
        plan_tier: PlanTier,
        is_active: bool,
        settings: Value,
        lifecycle: Lifecycle,
        created_at: DateTime<Utc>,
    ) -> AppResult<Self> {
        let organization = Self {
            id,
            slug,
            name: NonEmptyString::new(name)?,
            plan_tier,
            is_active,
            settings: Value::Null,
            lifecycle,
            created_at,
        };

        organization.with_settings(settings)
    }

    /// Sets the plan tier.
    #[must_use]
    pub fn with_plan_tier(mut self, plan_tier: PlanTier) -> Self {
        self.plan_tier = plan_tier;
        self
    }

    /// Replaces the settings blob, which must be a JSON object.
    pub fn with_settings(mut self, settings: Value) -> AppResult<Self> {
        if !settings.is_object() {
            return Err(AppError::Validation(
                "organization settings must be a JSON object".to_owned(),
            ));
        }

        self.settings = settings;
        Ok(self)
    }

    /// Returns the identifier.
    #[must_use]
    pub fn id(&self) -> OrganizationId {
        self.id
    }

    /// Returns the slug.
    #[must_use]
    pub fn slug(&self) -> &OrganizationSlug {
        &self.slug
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the plan tier.
    #[must_use]
    pub fn plan_tier(&self) -> PlanTier {
        self.plan_tier
    }

    /// Returns the active flag.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Returns the settings blob.
    #[must_use]
    pub fn settings(&self) -> &Value {
        &self.settings
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

    /// Returns whether lookups may see the organization.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.lifecycle.is_live()
    }
}

/// Role of a member inside one organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipRole {
    /// Read-only member.
    Viewer,
    /// Regular member.
    Member,
    /// Manages members and invitations.
    Admin,
    /// Full control; at least one per organization.
    Owner,
}

impl MembershipRole {
    /// Returns a stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Member => "member",
            Self::Admin => "admin",
            Self::Owner => "owner",
        }
    }

    /// Returns whether the role may add, remove or change members.
    #[must_use]
    pub fn can_manage_members(&self) -> bool {
        *self >= Self::Admin
    }

    /// Returns whether members with this role hold the `<slug>:admin` role.
    #[must_use]
    pub fn holds_tenant_admin_role(&self) -> bool {
        *self == Self::Owner
    }
}

impl FromStr for MembershipRole {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "viewer" => Ok(Self::Viewer),
            "member" => Ok(Self::Member),
            "admin" => Ok(Self::Admin),
            "owner" => Ok(Self::Owner),
            _ => Err(AppError::Validation(format!(
                "unknown membership role '{value}'"
            ))),
        }
    }
}

/// Subject's membership in one organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    org_id: OrganizationId,
    subject: String,
    email: Option<EmailAddress>,
    role: MembershipRole,
    is_primary: bool,
    joined_at: DateTime<Utc>,
    lifecycle: Lifecycle,
}

impl Membership {
    /// Creates a live membership.
    pub fn new(
        org_id: OrganizationId,
        subject: &str,
        email: Option<EmailAddress>,
        role: MembershipRole,
        joined_at: DateTime<Utc>,
    ) -> AppResult<Self> {
        let subject = NonEmptyString::new(subject.trim())?;

        Ok(Self {
            org_id,
            subject: subject.into(),
            email,
            role,
            is_primary: false,
            joined_at,
            lifecycle: Lifecycle::Live,
        })
    }

    /// Rehydrates a membership from storage.
    #[must_use]
    pub fn restore(
        org_id: OrganizationId,
        subject: String,
        email: Option<EmailAddress>,
        role: MembershipRole,
        is_primary: bool,
        joined_at: DateTime<Utc>,
        lifecycle: Lifecycle,
    ) -> Self {
        Self {
            org_id,
            subject,
            email,
            role,
            is_primary,
            joined_at,
            lifecycle,
        }
    }

    /// Marks the membership as the subject's primary organization.
    #[must_use]
    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self
    }

    /// Returns the organization.
    #[must_use]
    pub fn org_id(&self) -> OrganizationId {
        self.org_id
    }

    /// Returns the member subject.
    #[must_use]
    pub fn subject(&self) -> &str {
        self.subject.as_str()
    }

    /// Returns the email the member joined with.
    #[must_use]
    pub fn email(&self) -> Option<&EmailAddress> {
        self.email.as_ref()
    }

    /// Returns the membership role.
    #[must_use]
    pub fn role(&self) -> MembershipRole {
        self.role
    }

    /// Returns whether this is the subject's primary organization.
    #[must_use]
    pub fn is_primary(&self) -> bool {
        self.is_primary
    }

    /// Returns the join timestamp.
    #[must_use]
    pub fn joined_at(&self) -> DateTime<Utc> {
        self.joined_at
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Returns whether lookups may see the membership.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.lifecycle.is_live()
    }

    /// Changes the membership role.
    pub fn set_role(&mut self, role: MembershipRole) {
        self.role = role;
    }

    /// Sets or clears the primary flag.
    pub fn set_primary(&mut self, is_primary: bool) {
        self.is_primary = is_primary;
    }

    /// Tombstones the membership.
    pub fn mark_deleted(&mut self, deleted_at: DateTime<Utc>) {
        self.lifecycle = Lifecycle::Deleted { deleted_at };
    }
}

/// Live members of one organization, used for guard checks.
#[derive(Debug, Clone, Copy)]
pub struct MembershipRoster<'a> {
    members: &'a [Membership],
}

impl<'a> MembershipRoster<'a> {
    /// Wraps the organization's memberships; tombstoned rows are ignored.
    #[must_use]
    pub fn new(members: &'a [Membership]) -> Self {
        Self { members }
    }

    /// Returns the live membership of `subject`.
    #[must_use]
    pub fn member(&self, subject: &str) -> Option<&'a Membership> {
        self.members
            .iter()
            .find(|member| member.is_visible() && member.subject() == subject)
    }

    /// Returns whether a live member joined with `email`.
    #[must_use]
    pub fn has_email(&self, email: &EmailAddress) -> bool {
        self.members
            .iter()
            .any(|member| member.is_visible() && member.email() == Some(email))
    }

    /// Returns the number of live owners.
    #[must_use]
    pub fn owner_count(&self) -> usize {
        self.members
            .iter()
            .filter(|member| member.is_visible() && member.role() == MembershipRole::Owner)
            .count()
    }

    /// Ensures `inviter` may invite someone as `role`.
    pub fn ensure_can_invite(&self, inviter: &str, role: MembershipRole) -> AppResult<()> {
        let inviter = self.acting_manager(inviter)?;

        if role == MembershipRole::Owner && inviter.role() != MembershipRole::Owner {
            return Err(AppError::PermissionDenied(
                "only owners may invite owners".to_owned(),
            ));
        }

        Ok(())
    }

    /// Ensures `actor` may remove `target`.
    ///
    /// Members may always remove themselves unless they are the sole owner.
    pub fn ensure_can_remove(&self, actor: &str, target: &str) -> AppResult<()> {
        let target_member = self.member(target).ok_or_else(|| {
            AppError::NotFound(format!("subject '{target}' is not a member"))
        })?;

        if actor != target {
            let actor_member = self.acting_manager(actor)?;
            if target_member.role() == MembershipRole::Owner
                && actor_member.role() != MembershipRole::Owner
            {
                return Err(AppError::PermissionDenied(
                    "only owners may remove owners".to_owned(),
                ));
            }
        }

        self.ensure_not_sole_owner(target_member)
    }

    /// Ensures `actor` may move `target` to `role`.
    pub fn ensure_can_change_role(
        &self,
        actor: &str,
        target: &str,
        role: MembershipRole,
    ) -> AppResult<()> {
        let actor_member = self.acting_manager(actor)?;
        let target_member = self.member(target).ok_or_else(|| {
            AppError::NotFound(format!("subject '{target}' is not a member"))
        })?;

        let touches_owner =
            role == MembershipRole::Owner || target_member.role() == MembershipRole::Owner;
        if touches_owner && actor_member.role() != MembershipRole::Owner {
            return Err(AppError::PermissionDenied(
                "only owners may promote or demote owners".to_owned(),
            ));
        }

        if role != MembershipRole::Owner {
            self.ensure_not_sole_owner(target_member)?;
        }

        Ok(())
    }

    fn acting_manager(&self, actor: &str) -> AppResult<&'a Membership> {
        let member = self.member(actor).ok_or_else(|| {
            AppError::PermissionDenied(format!("subject '{actor}' is not a member"))
        })?;

        if !member.role().can_manage_members() {
            return Err(AppError::PermissionDenied(format!(
                "subject '{actor}' cannot manage members"
            )));
        }

        Ok(member)
    }

    fn ensure_not_sole_owner(&self, target: &Membership) -> AppResult<()> {
        if target.role() == MembershipRole::Owner && self.owner_count() <= 1 {
            return Err(AppError::SoleOwner(target.subject().to_owned()));
        }

        Ok(())
    }
}
