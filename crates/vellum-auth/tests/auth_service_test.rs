//! Integration tests for the AuthService using in-memory SurrealDB.

use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use vellum_auth::token::{self, TokenKind};
use vellum_auth::totp;
use vellum_auth::{AuthConfig, AuthService, LoginInput, LoginOutcome, RegisterInput};
use vellum_core::error::VellumError;
use vellum_core::models::tenant::{CreateTenant, UpdateTenant};
use vellum_core::models::user::{UpdateUser, User};
use vellum_core::repository::{TenantRepository, UserRepository};
use vellum_db::repository::{SurrealTenantRepository, SurrealUserRepository};

type Service = AuthService<SurrealTenantRepository<Db>, SurrealUserRepository<Db>>;

const PASSWORD: &str = "Correct-horse-9";

fn test_config() -> AuthConfig {
    AuthConfig {
        access_token_secret: "test-access-secret".into(),
        refresh_token_secret: "test-refresh-secret".into(),
        jwt_issuer: "vellum-test".into(),
        mfa_encryption_key: Some([7u8; 32]),
        totp_issuer: "Vellum-Test".into(),
        ..AuthConfig::default()
    }
}

async fn setup() -> (Surreal<Db>, Service) {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    vellum_db::run_migrations(&db).await.unwrap();

    SurrealTenantRepository::new(db.clone())
        .create(CreateTenant {
            name: "Acme".into(),
            slug: "acme".into(),
            storage_quota_bytes: None,
            settings: None,
        })
        .await
        .unwrap();

    let service = AuthService::new(
        SurrealTenantRepository::new(db.clone()),
        SurrealUserRepository::new(db.clone()),
        test_config(),
    );
    (db, service)
}

async fn register(service: &Service, email: &str) -> (User, String) {
    let reg = service
        .register(RegisterInput {
            tenant_slug: "acme".into(),
            email: email.into(),
            password: PASSWORD.into(),
            first_name: "Alice".into(),
            last_name: "Smith".into(),
        })
        .await
        .unwrap();
    (reg.user, reg.verification_token)
}

fn login_input(email: &str, password: &str) -> LoginInput {
    LoginInput {
        tenant_slug: "acme".into(),
        email: email.into(),
        password: password.into(),
        two_factor_code: None,
    }
}

async fn login_tokens(service: &Service, email: &str) -> vellum_auth::TokenPair {
    match service.login(login_input(email, PASSWORD)).await.unwrap() {
        LoginOutcome::Authenticated { tokens, .. } => tokens,
        other => panic!("expected tokens, got {other:?}"),
    }
}

async fn reload(db: &Surreal<Db>, user: &User) -> User {
    SurrealUserRepository::new(db.clone())
        .get_by_id(user.tenant_id, user.id)
        .await
        .unwrap()
}

/// Walk a user through 2FA setup and enable it, returning the raw
/// TOTP secret.
async fn enable_2fa(db: &Surreal<Db>, service: &Service, user: &User) -> Vec<u8> {
    let setup = service.setup_two_factor(user).await.unwrap();
    assert!(setup.otpauth_uri.starts_with("otpauth://totp/"));

    let secret = totp::decode_base32(&setup.secret).unwrap();
    let code = totp::current_code(&secret, "Vellum-Test", &user.email).unwrap();
    service
        .enable_two_factor(&reload(db, user).await, &code)
        .await
        .unwrap();
    secret
}

#[tokio::test]
async fn register_creates_unverified_user() {
    let (_db, service) = setup().await;
    let (user, token) = register(&service, "alice@example.com").await;

    assert!(!user.is_email_verified);
    assert!(user.is_active);
    assert!(!token.is_empty());
    assert_eq!(
        user.email_verification_token_hash.as_deref(),
        Some(token::hash_token(&token).as_str())
    );
}

#[tokio::test]
async fn register_rejects_weak_password_and_unknown_tenant() {
    let (_db, service) = setup().await;

    let weak = service
        .register(RegisterInput {
            tenant_slug: "acme".into(),
            email: "weak@example.com".into(),
            password: "short".into(),
            first_name: "W".into(),
            last_name: "P".into(),
        })
        .await;
    assert!(matches!(weak, Err(VellumError::Validation { .. })));

    let unknown = service
        .register(RegisterInput {
            tenant_slug: "nope".into(),
            email: "x@example.com".into(),
            password: PASSWORD.into(),
            first_name: "X".into(),
            last_name: "Y".into(),
        })
        .await;
    assert!(matches!(
        unknown,
        Err(VellumError::AuthenticationFailed { .. })
    ));
}

#[tokio::test]
async fn login_success_issues_verifiable_tokens() {
    let (_db, service) = setup().await;
    let (user, _) = register(&service, "alice@example.com").await;

    let outcome = service
        .login(login_input("ALICE@example.com", PASSWORD))
        .await
        .unwrap();
    let LoginOutcome::Authenticated { user: logged_in, tokens } = outcome else {
        panic!("expected tokens");
    };
    assert_eq!(logged_in.id, user.id);
    assert!(logged_in.last_login_at.is_some());
    assert_eq!(tokens.expires_in, 900);

    let who = service.authenticate(&tokens.access_token).await.unwrap();
    assert_eq!(who.user.id, user.id);
    assert_eq!(who.tenant.slug, "acme");

    // A refresh token cannot stand in for an access token.
    assert!(service.authenticate(&tokens.refresh_token).await.is_err());
}

#[tokio::test]
async fn wrong_password_and_unknown_email_look_the_same() {
    let (_db, service) = setup().await;
    register(&service, "alice@example.com").await;

    let wrong = service
        .login(login_input("alice@example.com", "Wrong-pass-1"))
        .await
        .unwrap_err();
    let unknown = service
        .login(login_input("ghost@example.com", PASSWORD))
        .await
        .unwrap_err();
    assert_eq!(wrong.to_string(), unknown.to_string());
}

#[tokio::test]
async fn five_failures_lock_the_account() {
    let (_db, service) = setup().await;
    register(&service, "alice@example.com").await;

    for _ in 0..5 {
        let err = service
            .login(login_input("alice@example.com", "Wrong-pass-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, VellumError::AuthenticationFailed { .. }));
    }

    // Sixth attempt with the right password is still refused.
    let err = service
        .login(login_input("alice@example.com", PASSWORD))
        .await
        .unwrap_err();
    let VellumError::AccountLocked { until } = err else {
        panic!("expected lock, got {err:?}");
    };
    let expected = Utc::now() + Duration::hours(2);
    assert!((until - expected).num_seconds().abs() < 10);
}

#[tokio::test]
async fn expired_lock_clears_on_next_attempt() {
    let (db, service) = setup().await;
    let (user, _) = register(&service, "alice@example.com").await;

    SurrealUserRepository::new(db)
        .update(
            user.tenant_id,
            user.id,
            UpdateUser {
                failed_login_attempts: Some(5),
                lock_until: Some(Some(Utc::now() - Duration::minutes(1))),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let outcome = service
        .login(login_input("alice@example.com", PASSWORD))
        .await
        .unwrap();
    let LoginOutcome::Authenticated { user, .. } = outcome else {
        panic!("expected tokens");
    };
    assert_eq!(user.failed_login_attempts, 0);
    assert!(user.lock_until.is_none());
}

#[tokio::test]
async fn success_resets_failure_counter() {
    let (_db, service) = setup().await;
    register(&service, "alice@example.com").await;

    for _ in 0..4 {
        let _ = service
            .login(login_input("alice@example.com", "Wrong-pass-1"))
            .await;
    }
    login_tokens(&service, "alice@example.com").await;

    // Four more failures do not lock after the reset.
    for _ in 0..4 {
        let _ = service
            .login(login_input("alice@example.com", "Wrong-pass-1"))
            .await;
    }
    login_tokens(&service, "alice@example.com").await;
}

#[tokio::test]
async fn inactive_user_and_tenant_cannot_log_in() {
    let (db, service) = setup().await;
    let (user, _) = register(&service, "alice@example.com").await;
    let tokens = login_tokens(&service, "alice@example.com").await;

    let users = SurrealUserRepository::new(db.clone());
    users
        .update(
            user.tenant_id,
            user.id,
            UpdateUser {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(
        service
            .login(login_input("alice@example.com", PASSWORD))
            .await
            .is_err()
    );
    assert!(service.authenticate(&tokens.access_token).await.is_err());

    users
        .update(
            user.tenant_id,
            user.id,
            UpdateUser {
                is_active: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    SurrealTenantRepository::new(db)
        .update(
            user.tenant_id,
            UpdateTenant {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(
        service
            .login(login_input("alice@example.com", PASSWORD))
            .await
            .is_err()
    );
    assert!(service.authenticate(&tokens.access_token).await.is_err());
}

#[tokio::test]
async fn refresh_returns_new_pair() {
    let (_db, service) = setup().await;
    let (user, _) = register(&service, "alice@example.com").await;
    let tokens = login_tokens(&service, "alice@example.com").await;

    let (refreshed_user, pair) = service.refresh(&tokens.refresh_token).await.unwrap();
    assert_eq!(refreshed_user.id, user.id);
    assert!(service.authenticate(&pair.access_token).await.is_ok());

    // An access token is not accepted as a refresh token.
    assert!(service.refresh(&tokens.access_token).await.is_err());
}

#[tokio::test]
async fn password_change_invalidates_older_tokens() {
    let (_db, service) = setup().await;
    let (user, _) = register(&service, "alice@example.com").await;
    let old = login_tokens(&service, "alice@example.com").await;

    // Token timestamps have one-second resolution.
    tokio::time::sleep(StdDuration::from_millis(1100)).await;

    let fresh = service
        .change_password(&user, PASSWORD, "New-password-42")
        .await
        .unwrap();

    let err = service.authenticate(&old.access_token).await.unwrap_err();
    assert!(matches!(err, VellumError::AuthenticationFailed { .. }));
    assert!(service.refresh(&old.refresh_token).await.is_err());
    assert!(service.authenticate(&fresh.access_token).await.is_ok());

    assert!(
        service
            .login(login_input("alice@example.com", "New-password-42"))
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn change_password_requires_current_password() {
    let (_db, service) = setup().await;
    let (user, _) = register(&service, "alice@example.com").await;

    let err = service
        .change_password(&user, "Not-my-pass-1", "New-password-42")
        .await
        .unwrap_err();
    assert!(matches!(err, VellumError::AuthenticationFailed { .. }));
}

#[tokio::test]
async fn forgot_and_reset_password() {
    let (_db, service) = setup().await;
    register(&service, "alice@example.com").await;

    assert!(
        service
            .forgot_password("acme", "ghost@example.com")
            .await
            .unwrap()
            .is_none()
    );

    let (user, raw) = service
        .forgot_password("acme", "alice@example.com")
        .await
        .unwrap()
        .unwrap();
    let expires = user.password_reset_expires_at.unwrap();
    assert!(expires > Utc::now() + Duration::minutes(59));

    assert!(
        service
            .reset_password("not-the-token", "Reset-pass-77")
            .await
            .is_err()
    );

    let reset = service.reset_password(&raw, "Reset-pass-77").await.unwrap();
    assert!(reset.password_reset_token_hash.is_none());

    // Tokens are single use.
    assert!(service.reset_password(&raw, "Other-pass-88").await.is_err());
    assert!(
        service
            .login(login_input("alice@example.com", "Reset-pass-77"))
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn verify_email_consumes_token() {
    let (_db, service) = setup().await;
    let (_, token) = register(&service, "alice@example.com").await;

    let user = service.verify_email(&token).await.unwrap();
    assert!(user.is_email_verified);
    assert!(user.email_verification_token_hash.is_none());

    assert!(matches!(
        service.verify_email(&token).await,
        Err(VellumError::Validation { .. })
    ));
}

#[tokio::test]
async fn two_factor_login_flow() {
    let (db, service) = setup().await;
    let (user, _) = register(&service, "alice@example.com").await;
    let secret = enable_2fa(&db, &service, &user).await;

    // Correct password without a code: no tokens.
    let outcome = service
        .login(login_input("alice@example.com", PASSWORD))
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        LoginOutcome::TwoFactorRequired { user_id } if user_id == user.id
    ));

    // Wrong code is an authentication failure.
    let mut input = login_input("alice@example.com", PASSWORD);
    input.two_factor_code = Some("abcdef".into());
    assert!(matches!(
        service.login(input).await,
        Err(VellumError::AuthenticationFailed { .. })
    ));

    let mut input = login_input("alice@example.com", PASSWORD);
    input.two_factor_code =
        Some(totp::current_code(&secret, "Vellum-Test", "alice@example.com").unwrap());
    let outcome = service.login(input).await.unwrap();
    let LoginOutcome::Authenticated { user, .. } = outcome else {
        panic!("expected tokens");
    };
    // The failed code attempt was cleared by the successful login.
    assert_eq!(user.failed_login_attempts, 0);
}

#[tokio::test]
async fn two_factor_enable_requires_valid_code() {
    let (db, service) = setup().await;
    let (user, _) = register(&service, "alice@example.com").await;

    service.setup_two_factor(&user).await.unwrap();
    let reloaded = reload(&db, &user).await;
    assert!(
        service
            .enable_two_factor(&reloaded, "000000x")
            .await
            .is_err()
    );
    assert!(!reload(&db, &user).await.two_factor_enabled);
}

#[tokio::test]
async fn two_factor_disable_needs_password_and_code() {
    let (db, service) = setup().await;
    let (user, _) = register(&service, "alice@example.com").await;
    let secret = enable_2fa(&db, &service, &user).await;
    let enabled = reload(&db, &user).await;
    assert!(enabled.two_factor_enabled);

    let code = totp::current_code(&secret, "Vellum-Test", "alice@example.com").unwrap();
    assert!(
        service
            .disable_two_factor(&enabled, "Wrong-pass-1", &code)
            .await
            .is_err()
    );

    let disabled = service
        .disable_two_factor(&enabled, PASSWORD, &code)
        .await
        .unwrap();
    assert!(!disabled.two_factor_enabled);
    assert!(disabled.two_factor_secret.is_none());

    login_tokens(&service, "alice@example.com").await;
}

#[test]
fn tokens_decode_with_matching_kind_only() {
    let config = test_config();
    let pair = token::issue_pair(uuid::Uuid::new_v4(), &config).unwrap();
    assert!(token::decode_token(&pair.access_token, TokenKind::Access, &config).is_ok());
    assert!(token::decode_token(&pair.access_token, TokenKind::Refresh, &config).is_err());
}
