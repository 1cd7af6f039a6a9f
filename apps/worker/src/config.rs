use std::env;
use std::time::Duration;

use warden_application::AccessControlSettings;
use warden_core::{AppError, AppResult};
use warden_infrastructure::SmtpEmailConfig;

const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";
const DEFAULT_MAX_HIERARCHY_DEPTH: usize = 10;
const DEFAULT_INVITATION_TTL_HOURS: i64 = 168;
const DEFAULT_PURGE_INTERVAL_SECS: u64 = 3600;
const DEFAULT_SMTP_PORT: u16 = 587;

/// Runtime configuration read from the environment.
#[derive(Debug, Clone)]
pub(crate) struct WorkerConfig {
    pub(crate) database_url: String,
    pub(crate) settings: AccessControlSettings,
    pub(crate) purge_interval: Duration,
    pub(crate) bootstrap_admin_subject: Option<String>,
    pub(crate) smtp: Option<SmtpEmailConfig>,
}

impl WorkerConfig {
    pub(crate) fn load() -> AppResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let database_url = read("DATABASE_URL")
            .ok_or_else(|| AppError::Validation("DATABASE_URL is required".to_owned()))?;
        let frontend_url = read("FRONTEND_URL").unwrap_or_else(|| DEFAULT_FRONTEND_URL.to_owned());
        let max_hierarchy_depth = parse_or(
            "RBAC_MAX_HIERARCHY_DEPTH",
            read("RBAC_MAX_HIERARCHY_DEPTH"),
            DEFAULT_MAX_HIERARCHY_DEPTH,
        )?;
        let invitation_ttl_hours = parse_or(
            "INVITATION_TTL_HOURS",
            read("INVITATION_TTL_HOURS"),
            DEFAULT_INVITATION_TTL_HOURS,
        )?;
        let purge_interval_secs = parse_or(
            "INVITATION_PURGE_INTERVAL_SECS",
            read("INVITATION_PURGE_INTERVAL_SECS"),
            DEFAULT_PURGE_INTERVAL_SECS,
        )?;

        if purge_interval_secs == 0 {
            return Err(AppError::Validation(
                "INVITATION_PURGE_INTERVAL_SECS must be greater than zero".to_owned(),
            ));
        }

        let settings =
            AccessControlSettings::new(max_hierarchy_depth, invitation_ttl_hours, frontend_url)?;

        let smtp = match read("SMTP_HOST") {
            Some(host) => Some(SmtpEmailConfig {
                host,
                port: parse_or("SMTP_PORT", read("SMTP_PORT"), DEFAULT_SMTP_PORT)?,
                username: read("SMTP_USERNAME").unwrap_or_default(),
                password: read("SMTP_PASSWORD").unwrap_or_default(),
                from_address: read("SMTP_FROM_ADDRESS").ok_or_else(|| {
                    AppError::Validation(
                        "SMTP_FROM_ADDRESS is required when SMTP_HOST is set".to_owned(),
                    )
                })?,
            }),
            None => None,
        };

        Ok(Self {
            database_url,
            settings,
            purge_interval: Duration::from_secs(purge_interval_secs),
            bootstrap_admin_subject: read("BOOTSTRAP_ADMIN_SUBJECT"),
            smtp,
        })
    }
}

fn parse_or<T>(name: &str, value: Option<String>, default: T) -> AppResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(value) => value.parse::<T>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use warden_core::AppError;

    use super::WorkerConfig;

    fn load(pairs: &[(&str, &str)]) -> Result<WorkerConfig, AppError> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
            .collect();

        WorkerConfig::from_lookup(|name| values.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_only_database_url_is_set() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/warden")])
            .unwrap_or_else(|_| unreachable!());

        assert_eq!(config.settings.max_hierarchy_depth(), 10);
        assert_eq!(config.settings.invitation_ttl().num_hours(), 168);
        assert_eq!(
            config.settings.accept_url("abc"),
            "http://localhost:3000/accept-invite?token=abc"
        );
        assert_eq!(config.purge_interval, Duration::from_secs(3600));
        assert!(config.bootstrap_admin_subject.is_none());
        assert!(config.smtp.is_none());
    }

    #[test]
    fn database_url_is_required() {
        let result = load(&[]);

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn depth_outside_bounds_is_rejected() {
        let result = load(&[
            ("DATABASE_URL", "postgres://localhost/warden"),
            ("RBAC_MAX_HIERARCHY_DEPTH", "65"),
        ]);

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn smtp_host_requires_sender() {
        let result = load(&[
            ("DATABASE_URL", "postgres://localhost/warden"),
            ("SMTP_HOST", "smtp.example.com"),
        ]);

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn smtp_settings_are_read() {
        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/warden"),
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_PORT", "2525"),
            ("SMTP_FROM_ADDRESS", "noreply@example.com"),
            ("BOOTSTRAP_ADMIN_SUBJECT", " root "),
        ])
        .unwrap_or_else(|_| unreachable!());

        let smtp = config.smtp.unwrap_or_else(|| unreachable!());
        assert_eq!(smtp.port, 2525);
        assert_eq!(smtp.from_address, "noreply@example.com");
        assert_eq!(config.bootstrap_admin_subject.as_deref(), Some("root"));
    }
}
