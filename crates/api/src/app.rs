//! Application wiring: config, services, and the router.

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use chrono::{Duration, Utc};

use gurukul_core::PrincipalId;
use gurukul_governance::GovernanceService;
use gurukul_identity::{vault, RegisterPrincipal, Role};
use gurukul_infra::{
    CommandPipeline, CourseCatalog, InMemoryPrincipalDirectory, LoggingNotificationDispatcher,
    NotificationDispatcher, PrincipalDirectory, StaticCourseCatalog,
};
use gurukul_sessions::{InMemorySessionStore, SessionRegistry, TokenConfig};

use crate::middleware::auth_middleware;
use crate::routes;

/// Process configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub jwt_secret: String,
    pub access_ttl_hours: i64,
    pub refresh_ttl_days: i64,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "dev-secret".to_string(),
            access_ttl_hours: 24,
            refresh_ttl_days: 14,
            bootstrap_admin: None,
        }
    }
}

/// Seed admin account created at startup if the directory doesn't have it.
#[derive(Debug, Clone)]
pub struct BootstrapAdmin {
    pub email: String,
    pub username: String,
    pub password: String,
}

pub type Directory = Arc<InMemoryPrincipalDirectory>;
pub type Registry = Arc<SessionRegistry<Arc<InMemorySessionStore>>>;
pub type Governance =
    GovernanceService<Directory, Arc<dyn NotificationDispatcher>, Arc<dyn CourseCatalog>>;

/// Shared service graph handed to every handler.
#[derive(Clone)]
pub struct AppServices {
    pub directory: Directory,
    pub pipeline: Arc<CommandPipeline<Directory>>,
    pub registry: Registry,
    pub governance: Arc<Governance>,
    pub notifier: Arc<dyn NotificationDispatcher>,
}

/// Wire the service graph with injectable collaborators (tests swap in
/// recording doubles here).
pub fn build_services(
    config: &AppConfig,
    notifier: Arc<dyn NotificationDispatcher>,
    catalog: Arc<dyn CourseCatalog>,
) -> AppServices {
    let directory: Directory = Arc::new(InMemoryPrincipalDirectory::new());
    let pipeline = Arc::new(CommandPipeline::new(Arc::clone(&directory)));

    let token_config = TokenConfig::with_ttls(
        config.jwt_secret.clone(),
        Duration::hours(config.access_ttl_hours),
        Duration::days(config.refresh_ttl_days),
    );
    let registry: Registry = Arc::new(SessionRegistry::new(
        token_config,
        Arc::new(InMemorySessionStore::new()),
    ));

    let governance = Arc::new(GovernanceService::new(
        Arc::clone(&directory),
        Arc::clone(&notifier),
        catalog,
    ));

    let services = AppServices {
        directory,
        pipeline,
        registry,
        governance,
        notifier,
    };

    if let Some(admin) = &config.bootstrap_admin {
        seed_admin(&services, admin);
    }

    services
}

/// Production wiring: logging notifier, empty course catalog.
pub fn build_app(config: AppConfig) -> Router {
    let services = build_services(
        &config,
        Arc::new(LoggingNotificationDispatcher),
        Arc::new(StaticCourseCatalog::default()),
    );
    build_router(services)
}

pub fn build_router(services: AppServices) -> Router {
    let protected = Router::new()
        .route("/whoami", get(routes::auth::whoami))
        .route("/auth/logout", axum::routing::post(routes::auth::logout))
        .route(
            "/auth/change-password",
            axum::routing::post(routes::auth::change_password),
        )
        .merge(routes::admin::router())
        .layer(axum::middleware::from_fn_with_state(
            services.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(routes::health))
        .merge(routes::auth::public_router())
        .merge(protected)
        .layer(Extension(services))
}

fn seed_admin(services: &AppServices, admin: &BootstrapAdmin) {
    match services.directory.find_by_email(&admin.email) {
        Ok(Some(_)) => return,
        Ok(None) => {}
        Err(e) => {
            tracing::error!(error = %e, "directory unavailable while seeding admin");
            return;
        }
    }

    let password_hash = match vault::hash_password(&admin.password) {
        Ok(hash) => hash,
        Err(e) => {
            tracing::error!(error = %e, "failed to hash bootstrap admin password");
            return;
        }
    };

    let result = services.pipeline.register(RegisterPrincipal {
        principal_id: PrincipalId::new(),
        email: admin.email.clone(),
        username: admin.username.clone(),
        display_name: admin.username.clone(),
        role: Role::Admin,
        password_hash,
        guru_profile: None,
        occurred_at: Utc::now(),
    });

    match result {
        Ok(principal) => {
            tracing::info!(principal = %principal.id, "seeded bootstrap admin");
        }
        Err(e) => tracing::error!(error = %e, "failed to seed bootstrap admin"),
    }
}
