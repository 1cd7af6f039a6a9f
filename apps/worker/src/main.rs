//! Warden worker: migrates the database, bootstraps the system roles, warms
//! the policy matcher and purges expired invitations on an interval.

#![forbid(unsafe_code)]

mod config;

use std::sync::Arc;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use warden_application::{
    AuthorizationService, ContextualPermissionResolver, EmailService, OrganizationService,
    OrganizationServiceDependencies, RandomTokenGenerator, RoleHierarchyResolver,
    SecurityAdminRepositories, SecurityAdminService, SystemClock,
};
use warden_core::{AppError, AppResult};
use warden_infrastructure::{
    ConsoleEmailService, InMemoryPolicyMatcher, PostgresAuditRepository,
    PostgresContextualPermissionRepository, PostgresGrantRepository, PostgresInvitationRepository,
    PostgresOrganizationRepository, PostgresRoleRepository, SmtpEmailService,
};

use crate::config::WorkerConfig;

struct Services {
    admin: SecurityAdminService,
    organizations: OrganizationService,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let pool = connect_pool(config.database_url.as_str()).await?;
    sqlx::migrate!("../../crates/infrastructure/migrations")
        .run(&pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

    let services = build_services(pool, &config)?;
    services.admin.bootstrap_system_roles().await?;
    if let Some(subject) = config.bootstrap_admin_subject.as_deref() {
        services.admin.bootstrap_administrator(subject).await?;
        info!(subject, "bootstrap administrator ensured");
    }
    let grants = services.admin.sync_policy_matcher().await?;

    info!(
        grants,
        max_hierarchy_depth = config.settings.max_hierarchy_depth(),
        purge_interval_secs = config.purge_interval.as_secs(),
        smtp = config.smtp.is_some(),
        "warden-worker started"
    );

    let mut interval = tokio::time::interval(config.purge_interval);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                match services.organizations.purge_expired_invitations().await {
                    Ok(purged) => info!(purged, "expired invitations purged"),
                    Err(error) => warn!(error = %error, "failed to purge expired invitations"),
                }
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(error) = signal {
                    warn!(error = %error, "failed to listen for shutdown signal");
                }
                info!("warden-worker stopping");
                return Ok(());
            }
        }
    }
}

async fn connect_pool(database_url: &str) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
}

fn build_services(pool: PgPool, config: &WorkerConfig) -> AppResult<Services> {
    let settings = config.settings.clone();
    let roles = Arc::new(PostgresRoleRepository::new(pool.clone()));
    let grants = Arc::new(PostgresGrantRepository::new(pool.clone()));
    let contextual = Arc::new(PostgresContextualPermissionRepository::new(pool.clone()));
    let organizations = Arc::new(PostgresOrganizationRepository::new(pool.clone()));
    let invitations = Arc::new(PostgresInvitationRepository::new(pool.clone()));
    let audit = Arc::new(PostgresAuditRepository::new(pool));
    let matcher = Arc::new(InMemoryPolicyMatcher::new());
    let clock = Arc::new(SystemClock);

    let email_service: Arc<dyn EmailService> = match config.smtp.clone() {
        Some(smtp) => Arc::new(SmtpEmailService::new(smtp)?),
        None => Arc::new(ConsoleEmailService::new()),
    };

    let hierarchy = RoleHierarchyResolver::new(roles.clone(), settings.max_hierarchy_depth());
    let contextual_resolver =
        ContextualPermissionResolver::new(hierarchy.clone(), contextual.clone());
    let authorization = AuthorizationService::new(
        roles.clone(),
        grants.clone(),
        hierarchy.clone(),
        contextual_resolver,
        matcher.clone(),
    );
    let admin = SecurityAdminService::new(
        authorization,
        hierarchy,
        SecurityAdminRepositories {
            roles: roles.clone(),
            grants: grants.clone(),
            assignments: grants,
            contextual_permissions: contextual,
            audit: audit.clone(),
        },
        matcher,
        clock.clone(),
        settings.clone(),
    );
    let organizations = OrganizationService::new(
        OrganizationServiceDependencies {
            organizations,
            invitations,
            roles,
            email_service,
            token_generator: Arc::new(RandomTokenGenerator),
            audit,
            clock,
        },
        settings,
    );

    Ok(Services {
        admin,
        organizations,
    })
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
