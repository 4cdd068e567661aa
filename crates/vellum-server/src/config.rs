//! Process configuration.
//!
//! Every setting can come from a flag or an environment variable; a
//! `.env` file is loaded by `main` before parsing. Library crates only
//! ever see the plain config structs produced here.

use std::net::SocketAddr;
use std::time::Duration;

use clap::{Args, Parser};
use vellum_auth::AuthConfig;
use vellum_auth::config::parse_encryption_key;
use vellum_db::DbConfig;
use vellum_mail::SmtpConfig;
use vellum_storage::S3Config;

use crate::middleware::rate_limit::RateLimitSettings;

#[derive(Debug, Parser)]
#[command(name = "vellum", version, about = "Multi-tenant document storage and collaboration API")]
pub struct Cli {
    #[arg(long, env = "VELLUM_LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen_addr: SocketAddr,

    #[command(flatten)]
    pub database: DatabaseArgs,

    #[command(flatten)]
    pub auth: AuthArgs,

    #[command(flatten)]
    pub storage: StorageArgs,

    #[command(flatten)]
    pub mail: MailArgs,

    #[command(flatten)]
    pub server: ServerArgs,

    #[command(flatten)]
    pub bootstrap: BootstrapArgs,
}

#[derive(Debug, Args)]
pub struct DatabaseArgs {
    #[arg(long = "db-url", env = "VELLUM_DB_URL", default_value = "ws://127.0.0.1:8000")]
    pub url: String,
    #[arg(long = "db-namespace", env = "VELLUM_DB_NAMESPACE", default_value = "vellum")]
    pub namespace: String,
    #[arg(long = "db-database", env = "VELLUM_DB_DATABASE", default_value = "main")]
    pub database: String,
    #[arg(id = "db_username", long = "db-username", env = "VELLUM_DB_USERNAME")]
    pub username: Option<String>,
    #[arg(id = "db_password", long = "db-password", env = "VELLUM_DB_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Debug, Args)]
pub struct AuthArgs {
    #[arg(long, env = "JWT_ACCESS_SECRET", hide_env_values = true)]
    pub jwt_access_secret: String,
    #[arg(long, env = "JWT_REFRESH_SECRET", hide_env_values = true)]
    pub jwt_refresh_secret: String,
    #[arg(long, env = "JWT_ACCESS_TTL_SECS", default_value_t = 900)]
    pub jwt_access_ttl_secs: u64,
    #[arg(long, env = "JWT_REFRESH_TTL_SECS", default_value_t = 604_800)]
    pub jwt_refresh_ttl_secs: u64,
    #[arg(long, env = "JWT_ISSUER", default_value = "vellum")]
    pub jwt_issuer: String,
    #[arg(long, env = "VELLUM_PASSWORD_PEPPER", hide_env_values = true)]
    pub password_pepper: Option<String>,
    /// 64 hex characters (AES-256) used to encrypt TOTP secrets.
    #[arg(long, env = "VELLUM_MFA_ENCRYPTION_KEY", hide_env_values = true)]
    pub mfa_encryption_key: Option<String>,
    #[arg(long, env = "VELLUM_MAX_LOGIN_ATTEMPTS", default_value_t = 5)]
    pub max_login_attempts: u32,
    #[arg(long, env = "VELLUM_LOCKOUT_SECS", default_value_t = 7200)]
    pub lockout_secs: u64,
}

#[derive(Debug, Args)]
pub struct StorageArgs {
    #[arg(long = "s3-bucket", env = "S3_BUCKET", default_value = "vellum-documents")]
    pub bucket: String,
    #[arg(long = "s3-region", env = "AWS_REGION", default_value = "us-east-1")]
    pub region: String,
    #[arg(long = "s3-endpoint", env = "S3_ENDPOINT")]
    pub endpoint: Option<String>,
    #[arg(long = "s3-access-key-id", env = "AWS_ACCESS_KEY_ID", hide_env_values = true)]
    pub access_key_id: Option<String>,
    #[arg(long = "s3-secret-access-key", env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
    pub secret_access_key: Option<String>,
    #[arg(long = "s3-force-path-style", env = "S3_FORCE_PATH_STYLE", default_value_t = false)]
    pub force_path_style: bool,
    #[arg(long = "s3-connect-timeout-secs", env = "S3_CONNECT_TIMEOUT_SECS", default_value_t = 5)]
    pub connect_timeout_secs: u64,
    #[arg(
        long = "s3-operation-timeout-secs",
        env = "S3_OPERATION_TIMEOUT_SECS",
        default_value_t = 60
    )]
    pub operation_timeout_secs: u64,
    /// Keep objects in process memory instead of S3 (local development).
    #[arg(long = "storage-in-memory", env = "VELLUM_STORAGE_IN_MEMORY", default_value_t = false)]
    pub in_memory: bool,
}

#[derive(Debug, Args)]
pub struct MailArgs {
    #[arg(long = "smtp-host", env = "SMTP_HOST")]
    pub host: Option<String>,
    #[arg(long = "smtp-port", env = "SMTP_PORT", default_value_t = 587)]
    pub port: u16,
    #[arg(id = "smtp_username", long = "smtp-username", env = "SMTP_USERNAME")]
    pub username: Option<String>,
    #[arg(id = "smtp_password", long = "smtp-password", env = "SMTP_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
    #[arg(long = "smtp-from", env = "SMTP_FROM", default_value = "Vellum <no-reply@vellum.local>")]
    pub from: String,
    #[arg(long = "smtp-starttls", env = "SMTP_STARTTLS", default_value_t = true)]
    pub starttls: bool,
}

#[derive(Debug, Args)]
pub struct ServerArgs {
    /// Base URL of the web application, used for links in emails.
    #[arg(long, env = "VELLUM_PUBLIC_URL", default_value = "http://localhost:3000")]
    pub public_url: String,
    #[arg(long, env = "VELLUM_MAX_UPLOAD_BYTES", default_value_t = 50 * 1024 * 1024)]
    pub max_upload_bytes: u64,
    /// Comma-separated MIME types accepted for upload. Empty accepts all.
    #[arg(long, env = "VELLUM_ALLOWED_MIME_TYPES", value_delimiter = ',')]
    pub allowed_mime_types: Vec<String>,
    #[arg(long, env = "VELLUM_PRESIGN_TTL_SECS", default_value_t = 3600)]
    pub presign_ttl_secs: u64,
    #[arg(long, env = "VELLUM_RATE_LIMIT_WINDOW_SECS", default_value_t = 900)]
    pub rate_limit_window_secs: u64,
    #[arg(long, env = "VELLUM_RATE_LIMIT_MAX", default_value_t = 300)]
    pub rate_limit_max: u32,
    #[arg(long, env = "VELLUM_AUTH_RATE_LIMIT_MAX", default_value_t = 20)]
    pub auth_rate_limit_max: u32,
    #[arg(long, env = "VELLUM_ACTIVITY_RETENTION_DAYS", default_value_t = 90)]
    pub activity_retention_days: u32,
    /// Allowed CORS origins. Empty allows any origin.
    #[arg(long, env = "VELLUM_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Vec<String>,
    /// Budget for each dependency probe made by `/health`.
    #[arg(long, env = "VELLUM_HEALTH_CHECK_TIMEOUT_MS", default_value_t = 2000)]
    pub health_check_timeout_ms: u64,
}

#[derive(Debug, Args)]
pub struct BootstrapArgs {
    #[arg(long, env = "VELLUM_BOOTSTRAP_TENANT_NAME")]
    pub bootstrap_tenant_name: Option<String>,
    #[arg(long, env = "VELLUM_BOOTSTRAP_TENANT_SLUG")]
    pub bootstrap_tenant_slug: Option<String>,
    #[arg(long, env = "VELLUM_BOOTSTRAP_ADMIN_EMAIL")]
    pub bootstrap_admin_email: Option<String>,
    #[arg(long, env = "VELLUM_BOOTSTRAP_ADMIN_PASSWORD", hide_env_values = true)]
    pub bootstrap_admin_password: Option<String>,
}

/// HTTP-layer settings shared with handlers.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub public_url: String,
    pub max_upload_bytes: u64,
    /// `None` accepts every MIME type.
    pub allowed_mime_types: Option<Vec<String>>,
    pub presign_ttl_secs: u64,
    pub general_rate_limit: RateLimitSettings,
    pub auth_rate_limit: RateLimitSettings,
    pub activity_retention_days: u32,
    pub cors_origins: Vec<String>,
    pub health_check_timeout: Duration,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            public_url: "http://localhost:3000".into(),
            max_upload_bytes: 50 * 1024 * 1024,
            allowed_mime_types: None,
            presign_ttl_secs: 3600,
            general_rate_limit: RateLimitSettings {
                window_secs: 900,
                max_requests: 300,
            },
            auth_rate_limit: RateLimitSettings {
                window_secs: 900,
                max_requests: 20,
            },
            activity_retention_days: 90,
            cors_origins: Vec::new(),
            health_check_timeout: Duration::from_secs(2),
        }
    }
}

/// Initial tenant and platform admin created on startup when missing.
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    pub tenant_name: String,
    pub tenant_slug: String,
    pub admin_email: String,
    pub admin_password: String,
}

impl Cli {
    pub fn db_config(&self) -> DbConfig {
        DbConfig {
            url: self.database.url.clone(),
            namespace: self.database.namespace.clone(),
            database: self.database.database.clone(),
            username: self.database.username.clone(),
            password: self.database.password.clone(),
        }
    }

    pub fn auth_config(&self) -> anyhow::Result<AuthConfig> {
        let a = &self.auth;
        if a.jwt_access_secret == a.jwt_refresh_secret {
            anyhow::bail!("JWT_ACCESS_SECRET and JWT_REFRESH_SECRET must differ");
        }
        let mfa_encryption_key = a
            .mfa_encryption_key
            .as_deref()
            .map(parse_encryption_key)
            .transpose()?;

        Ok(AuthConfig {
            access_token_secret: a.jwt_access_secret.clone(),
            refresh_token_secret: a.jwt_refresh_secret.clone(),
            access_token_lifetime_secs: a.jwt_access_ttl_secs,
            refresh_token_lifetime_secs: a.jwt_refresh_ttl_secs,
            jwt_issuer: a.jwt_issuer.clone(),
            pepper: a.password_pepper.clone(),
            mfa_encryption_key,
            max_failed_login_attempts: a.max_login_attempts,
            lockout_duration_secs: a.lockout_secs,
            ..AuthConfig::default()
        })
    }

    pub fn s3_config(&self) -> S3Config {
        let s = &self.storage;
        S3Config {
            bucket: s.bucket.clone(),
            region: s.region.clone(),
            endpoint_url: s.endpoint.clone(),
            access_key_id: s.access_key_id.clone(),
            secret_access_key: s.secret_access_key.clone(),
            force_path_style: s.force_path_style,
            connect_timeout: Duration::from_secs(s.connect_timeout_secs),
            operation_timeout: Duration::from_secs(s.operation_timeout_secs),
        }
    }

    /// `None` when no SMTP host is configured; mail is then recorded
    /// in memory only.
    pub fn smtp_config(&self) -> Option<SmtpConfig> {
        let m = &self.mail;
        m.host.as_ref().map(|host| SmtpConfig {
            host: host.clone(),
            port: m.port,
            username: m.username.clone(),
            password: m.password.clone(),
            from: m.from.clone(),
            starttls: m.starttls,
        })
    }

    pub fn server_settings(&self) -> ServerSettings {
        let s = &self.server;
        let allowed: Vec<String> = s
            .allowed_mime_types
            .iter()
            .map(|m| m.trim().to_lowercase())
            .filter(|m| !m.is_empty())
            .collect();

        ServerSettings {
            public_url: s.public_url.trim_end_matches('/').to_string(),
            max_upload_bytes: s.max_upload_bytes,
            allowed_mime_types: (!allowed.is_empty()).then_some(allowed),
            presign_ttl_secs: s.presign_ttl_secs,
            general_rate_limit: RateLimitSettings {
                window_secs: s.rate_limit_window_secs,
                max_requests: s.rate_limit_max,
            },
            auth_rate_limit: RateLimitSettings {
                window_secs: s.rate_limit_window_secs,
                max_requests: s.auth_rate_limit_max,
            },
            activity_retention_days: s.activity_retention_days,
            cors_origins: s.cors_origins.clone(),
            health_check_timeout: Duration::from_millis(s.health_check_timeout_ms),
        }
    }

    pub fn bootstrap_config(&self) -> Option<BootstrapConfig> {
        let b = &self.bootstrap;
        let slug = b.bootstrap_tenant_slug.clone()?;
        Some(BootstrapConfig {
            tenant_name: b.bootstrap_tenant_name.clone().unwrap_or_else(|| slug.clone()),
            tenant_slug: slug,
            admin_email: b.bootstrap_admin_email.clone()?,
            admin_password: b.bootstrap_admin_password.clone()?,
        })
    }
}
