//! Shared application state, built once at startup and handed to every
//! handler behind an `Arc`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use surrealdb::Surreal;
use surrealdb::engine::any::Any;
use sysinfo::System;
use tokio::sync::Mutex;
use vellum_auth::{AuthConfig, AuthService};
use vellum_db::DbManager;
use vellum_db::repository::{
    SurrealActivityLogRepository, SurrealCommentRepository, SurrealDocumentRepository,
    SurrealMessageRepository, SurrealNotificationRepository, SurrealStatsRepository,
    SurrealTenantRepository, SurrealUserRepository,
};
use vellum_mail::Mailer;
use vellum_storage::ObjectStore;

use crate::config::ServerSettings;
use crate::middleware::RateLimiter;

pub type Auth = AuthService<SurrealTenantRepository<Any>, SurrealUserRepository<Any>>;

pub struct AppState {
    pub db: DbManager,
    pub tenants: SurrealTenantRepository<Any>,
    pub users: SurrealUserRepository<Any>,
    pub documents: SurrealDocumentRepository<Any>,
    pub comments: SurrealCommentRepository<Any>,
    pub notifications: SurrealNotificationRepository<Any>,
    pub messages: SurrealMessageRepository<Any>,
    pub activity: SurrealActivityLogRepository<Any>,
    pub stats: SurrealStatsRepository<Any>,
    pub auth: Auth,
    pub store: Arc<dyn ObjectStore>,
    pub mailer: Arc<dyn Mailer>,
    pub settings: ServerSettings,
    pub general_limiter: Arc<RateLimiter>,
    pub auth_limiter: Arc<RateLimiter>,
    pub started_at: Instant,
    pub system: Mutex<System>,
}

impl AppState {
    pub fn new(
        db: DbManager,
        auth_config: AuthConfig,
        store: Arc<dyn ObjectStore>,
        mailer: Arc<dyn Mailer>,
        settings: ServerSettings,
    ) -> Self {
        let client: Surreal<Any> = db.client().clone();
        let users = SurrealUserRepository::with_pepper(client.clone(), auth_config.pepper.clone());
        let tenants = SurrealTenantRepository::new(client.clone());
        let auth = AuthService::new(tenants.clone(), users.clone(), auth_config);

        Self {
            tenants,
            users,
            documents: SurrealDocumentRepository::new(client.clone()),
            comments: SurrealCommentRepository::new(client.clone()),
            notifications: SurrealNotificationRepository::new(client.clone()),
            messages: SurrealMessageRepository::new(client.clone()),
            activity: SurrealActivityLogRepository::new(client.clone()),
            stats: SurrealStatsRepository::new(client),
            auth,
            store,
            mailer,
            general_limiter: Arc::new(RateLimiter::new(settings.general_rate_limit)),
            auth_limiter: Arc::new(RateLimiter::new(settings.auth_rate_limit)),
            settings,
            started_at: Instant::now(),
            system: Mutex::new(System::new()),
            db,
        }
    }

    pub fn presign_ttl(&self) -> Duration {
        Duration::from_secs(self.settings.presign_ttl_secs)
    }

    /// Expiry stamped on activity entries written now.
    pub fn activity_expires_at(&self) -> chrono::DateTime<Utc> {
        Utc::now() + chrono::Duration::days(i64::from(self.settings.activity_retention_days))
    }

    /// Link into the web application, e.g. `app_url("/documents/{id}")`.
    pub fn app_url(&self, path: &str) -> String {
        format!("{}{}", self.settings.public_url, path)
    }
}
