use chrono::Duration;
use warden_core::{AppError, AppResult};
use warden_domain::{DEFAULT_INVITATION_TTL_HOURS, DEFAULT_MAX_HIERARCHY_DEPTH};

/// Largest accepted hierarchy depth bound.
pub const MAX_HIERARCHY_DEPTH_LIMIT: usize = 64;

/// Tunables shared by the access-control services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessControlSettings {
    max_hierarchy_depth: usize,
    invitation_ttl: Duration,
    accept_url_base: String,
}

impl AccessControlSettings {
    /// Creates validated settings.
    pub fn new(
        max_hierarchy_depth: usize,
        invitation_ttl_hours: i64,
        accept_url_base: impl Into<String>,
    ) -> AppResult<Self> {
        if !(1..=MAX_HIERARCHY_DEPTH_LIMIT).contains(&max_hierarchy_depth) {
            return Err(AppError::Validation(format!(
                "max hierarchy depth must be between 1 and {MAX_HIERARCHY_DEPTH_LIMIT}"
            )));
        }

        if invitation_ttl_hours <= 0 {
            return Err(AppError::Validation(
                "invitation ttl must be positive".to_owned(),
            ));
        }

        let accept_url_base = accept_url_base.into().trim_end_matches('/').to_owned();
        if accept_url_base.is_empty() {
            return Err(AppError::Validation(
                "invitation accept url base must not be empty".to_owned(),
            ));
        }

        Ok(Self {
            max_hierarchy_depth,
            invitation_ttl: Duration::hours(invitation_ttl_hours),
            accept_url_base,
        })
    }

    /// Returns the maximum number of ancestors a role may have.
    #[must_use]
    pub fn max_hierarchy_depth(&self) -> usize {
        self.max_hierarchy_depth
    }

    /// Returns the invitation lifetime.
    #[must_use]
    pub fn invitation_ttl(&self) -> Duration {
        self.invitation_ttl
    }

    /// Builds the accept link sent with an invitation.
    #[must_use]
    pub fn accept_url(&self, raw_token: &str) -> String {
        format!("{}/accept-invite?token={raw_token}", self.accept_url_base)
    }
}

impl Default for AccessControlSettings {
    fn default() -> Self {
        Self {
            max_hierarchy_depth: DEFAULT_MAX_HIERARCHY_DEPTH,
            invitation_ttl: Duration::hours(DEFAULT_INVITATION_TTL_HOURS),
            accept_url_base: "http://localhost:3000".to_owned(),
        }
    }
}
