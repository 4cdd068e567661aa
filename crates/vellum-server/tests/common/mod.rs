//! Shared harness: the full router over in-memory database, storage and
//! mail backends, driven with `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use vellum_auth::AuthConfig;
use vellum_core::models::tenant::{CreateTenant, Tenant};
use vellum_core::repository::TenantRepository;
use vellum_db::{DbConfig, DbManager};
use vellum_mail::MemoryMailer;
use vellum_server::AppState;
use vellum_server::bootstrap;
use vellum_server::config::{BootstrapConfig, ServerSettings};
use vellum_storage::MemoryStore;

pub const PASSWORD: &str = "Correct-horse-9";
pub const TOTP_ISSUER: &str = "Vellum-Test";
const BOUNDARY: &str = "vellum-test-boundary";

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub store: Arc<MemoryStore>,
    pub mailer: Arc<MemoryMailer>,
}

pub fn auth_config() -> AuthConfig {
    AuthConfig {
        access_token_secret: "test-access-secret".into(),
        refresh_token_secret: "test-refresh-secret".into(),
        jwt_issuer: "vellum-test".into(),
        mfa_encryption_key: Some([7u8; 32]),
        totp_issuer: TOTP_ISSUER.into(),
        ..AuthConfig::default()
    }
}

pub fn settings() -> ServerSettings {
    let mut settings = ServerSettings::default();
    settings.auth_rate_limit.max_requests = 1_000;
    settings.general_rate_limit.max_requests = 10_000;
    settings
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_settings(settings()).await
    }

    pub async fn with_settings(settings: ServerSettings) -> Self {
        let db = DbManager::connect(&DbConfig::in_memory()).await.unwrap();
        let store = Arc::new(MemoryStore::new());
        let mailer = Arc::new(MemoryMailer::new());
        let state = Arc::new(AppState::new(
            db,
            auth_config(),
            store.clone(),
            mailer.clone(),
            settings,
        ));
        let router = vellum_server::router(state.clone());
        Self {
            router,
            state,
            store,
            mailer,
        }
    }

    pub async fn create_tenant(&self, slug: &str) -> Tenant {
        self.state
            .tenants
            .create(CreateTenant {
                name: slug.to_uppercase(),
                slug: slug.into(),
                storage_quota_bytes: None,
                settings: None,
            })
            .await
            .unwrap()
    }

    /// Bootstrap a platform admin in tenant `ops` and return its token.
    pub async fn admin_token(&self) -> String {
        bootstrap::run(
            &self.state,
            &BootstrapConfig {
                tenant_name: "Operations".into(),
                tenant_slug: "ops".into(),
                admin_email: "admin@vellum.test".into(),
                admin_password: PASSWORD.into(),
            },
        )
        .await
        .unwrap();
        self.login("ops", "admin@vellum.test").await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    pub async fn get(&self, path: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::GET, path, Some(token), None).await
    }

    pub async fn post(&self, path: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, path, token, Some(body)).await
    }

    pub async fn delete(&self, path: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::DELETE, path, Some(token), None).await
    }

    pub async fn register(&self, tenant: &str, email: &str) -> Value {
        let (status, body) = self
            .post(
                "/api/v1/auth/register",
                None,
                json!({
                    "tenant": tenant,
                    "email": email,
                    "password": PASSWORD,
                    "first_name": "Test",
                    "last_name": "User",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"].clone()
    }

    pub async fn login(&self, tenant: &str, email: &str) -> String {
        let (status, body) = self
            .post(
                "/api/v1/auth/login",
                None,
                json!({ "tenant": tenant, "email": email, "password": PASSWORD }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["data"]["access_token"].as_str().unwrap().to_string()
    }

    /// Register and log in; returns `(user_id, access_token)`.
    pub async fn user(&self, tenant: &str, email: &str) -> (String, String) {
        let user = self.register(tenant, email).await;
        let token = self.login(tenant, email).await;
        (user["id"].as_str().unwrap().to_string(), token)
    }

    pub async fn upload_to(
        &self,
        path: &str,
        token: &str,
        file_name: &str,
        content: &[u8],
        fields: &[(&str, &str)],
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(file_name, content, fields)))
            .unwrap();
        self.send(request).await
    }

    /// Upload a new document and return its JSON.
    pub async fn upload(&self, token: &str, file_name: &str, content: &[u8]) -> Value {
        let (status, body) = self
            .upload_to("/api/v1/documents", token, file_name, content, &[])
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"].clone()
    }
}

fn multipart_body(file_name: &str, content: &[u8], fields: &[(&str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; \
             filename=\"{file_name}\"\r\nContent-Type: text/plain\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}
