//! Authentication service: registration, login with lockout and
//! two-factor, token refresh, password lifecycle and email verification.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;
use vellum_core::error::{VellumError, VellumResult};
use vellum_core::models::tenant::Tenant;
use vellum_core::models::user::{CreateUser, UpdateUser, User, UserRole};
use vellum_core::repository::{TenantRepository, UserRepository};

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::password;
use crate::token::{self, Claims, TokenKind, TokenPair};
use crate::totp;

#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub tenant_slug: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

/// A freshly registered account and the raw verification token that
/// must be mailed to it.
#[derive(Debug)]
pub struct Registration {
    pub user: User,
    pub tenant: Tenant,
    pub verification_token: String,
}

#[derive(Debug, Clone)]
pub struct LoginInput {
    pub tenant_slug: String,
    pub email: String,
    pub password: String,
    pub two_factor_code: Option<String>,
}

#[derive(Debug)]
pub enum LoginOutcome {
    Authenticated { user: User, tokens: TokenPair },
    /// Password was correct but a TOTP code is needed. No tokens issued.
    TwoFactorRequired { user_id: Uuid },
}

/// The identity behind a verified access token.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub user: User,
    pub tenant: Tenant,
}

#[derive(Debug, Clone)]
pub struct TwoFactorSetup {
    /// Base32 secret for manual entry.
    pub secret: String,
    pub otpauth_uri: String,
}

/// Authentication service.
///
/// Generic over repository implementations so that the auth layer
/// has no dependency on the database crate.
pub struct AuthService<T: TenantRepository, U: UserRepository> {
    tenants: T,
    users: U,
    config: AuthConfig,
}

impl<T: TenantRepository, U: UserRepository> AuthService<T, U> {
    pub fn new(tenants: T, users: U, config: AuthConfig) -> Self {
        Self {
            tenants,
            users,
            config,
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn issue_tokens(&self, user_id: Uuid) -> VellumResult<TokenPair> {
        Ok(token::issue_pair(user_id, &self.config)?)
    }

    /// Resolve an active tenant by slug.
    async fn active_tenant(&self, slug: &str) -> VellumResult<Tenant> {
        let tenant = self
            .tenants
            .get_by_slug(&slug.trim().to_lowercase())
            .await
            .map_err(|e| match e {
                VellumError::NotFound { .. } => AuthError::InvalidCredentials.into(),
                other => other,
            })?;
        if !tenant.is_active {
            return Err(AuthError::TenantInactive.into());
        }
        Ok(tenant)
    }

    fn verify(&self, user: &User, candidate: &str) -> VellumResult<bool> {
        Ok(password::verify_password(
            candidate,
            &user.password_hash,
            self.config.pepper.as_deref(),
        )?)
    }

    pub async fn register(&self, input: RegisterInput) -> VellumResult<Registration> {
        let tenant = self.active_tenant(&input.tenant_slug).await?;
        password::check_policy(&input.password, self.config.min_password_length)?;

        let verification_token = token::generate_opaque_token();
        let user = self
            .users
            .create(CreateUser {
                tenant_id: tenant.id,
                email: input.email,
                password: input.password,
                first_name: input.first_name,
                last_name: input.last_name,
                role: UserRole::User,
                email_verification_token_hash: Some(token::hash_token(&verification_token)),
            })
            .await?;

        info!(tenant_id = %tenant.id, user_id = %user.id, "user registered");
        Ok(Registration {
            user,
            tenant,
            verification_token,
        })
    }

    /// Password login with lockout and an optional second factor.
    ///
    /// Order of checks: active lock, password, account status, second
    /// factor. A lock whose time has passed is cleared before the
    /// password is examined.
    pub async fn login(&self, input: LoginInput) -> VellumResult<LoginOutcome> {
        let tenant = self.active_tenant(&input.tenant_slug).await?;
        let mut user = self
            .users
            .get_by_email(tenant.id, &input.email)
            .await
            .map_err(|e| match e {
                VellumError::NotFound { .. } => AuthError::InvalidCredentials.into(),
                other => other,
            })?;

        let now = Utc::now();
        if let Some(until) = user.lock_until {
            if until > now {
                debug!(user_id = %user.id, %until, "login attempt on locked account");
                return Err(AuthError::AccountLocked { until }.into());
            }
            user = self
                .users
                .update(
                    tenant.id,
                    user.id,
                    UpdateUser {
                        failed_login_attempts: Some(0),
                        lock_until: Some(None),
                        ..Default::default()
                    },
                )
                .await?;
        }

        if !self.verify(&user, &input.password)? {
            return Err(self.record_failure(&user, now).await);
        }

        if !user.is_active {
            return Err(AuthError::AccountInactive.into());
        }

        if user.two_factor_enabled {
            let Some(code) = input.two_factor_code.as_deref() else {
                return Ok(LoginOutcome::TwoFactorRequired { user_id: user.id });
            };
            if !self.check_code(&user, code)? {
                return Err(match self.record_failure(&user, now).await {
                    VellumError::AuthenticationFailed { .. } => {
                        AuthError::InvalidTwoFactorCode.into()
                    }
                    other => other,
                });
            }
        }

        let user = self
            .users
            .update(
                tenant.id,
                user.id,
                UpdateUser {
                    failed_login_attempts: Some(0),
                    lock_until: Some(None),
                    last_login_at: Some(now),
                    ..Default::default()
                },
            )
            .await?;

        let tokens = self.issue_tokens(user.id)?;
        info!(tenant_id = %tenant.id, user_id = %user.id, "login succeeded");
        Ok(LoginOutcome::Authenticated { user, tokens })
    }

    /// Count a failed attempt and lock the account once the threshold
    /// is reached. Returns the error the caller should surface.
    async fn record_failure(&self, user: &User, now: DateTime<Utc>) -> VellumError {
        let attempts = user.failed_login_attempts + 1;
        let lock_until = (attempts >= self.config.max_failed_login_attempts)
            .then(|| now + Duration::seconds(self.config.lockout_duration_secs as i64));

        let update = UpdateUser {
            failed_login_attempts: Some(attempts),
            lock_until: lock_until.map(Some),
            ..Default::default()
        };
        if let Err(e) = self.users.update(user.tenant_id, user.id, update).await {
            return e;
        }

        if let Some(until) = lock_until {
            warn!(
                tenant_id = %user.tenant_id,
                user_id = %user.id,
                %until,
                "account locked after repeated failures"
            );
        }
        AuthError::InvalidCredentials.into()
    }

    /// Load the user behind a verified token and apply the
    /// password-change watermark.
    async fn resolve(&self, claims: &Claims) -> VellumResult<User> {
        let user = self
            .users
            .find_by_id(claims.user_id()?)
            .await
            .map_err(|e| match e {
                VellumError::NotFound { .. } => {
                    AuthError::TokenInvalid("user no longer exists".into()).into()
                }
                other => other,
            })?;

        if user
            .password_changed_at
            .is_some_and(|changed| claims.iat < changed.timestamp())
        {
            return Err(AuthError::StaleToken.into());
        }
        if !user.is_active {
            return Err(AuthError::AccountInactive.into());
        }
        Ok(user)
    }

    /// Verify an access token and load the user and tenant behind it.
    pub async fn authenticate(&self, access_token: &str) -> VellumResult<Authenticated> {
        let claims = token::decode_token(access_token, TokenKind::Access, &self.config)?;
        let user = self.resolve(&claims).await?;
        let tenant = self.tenants.get_by_id(user.tenant_id).await?;
        if !tenant.is_active {
            return Err(AuthError::TenantInactive.into());
        }
        Ok(Authenticated { user, tenant })
    }

    pub async fn refresh(&self, refresh_token: &str) -> VellumResult<(User, TokenPair)> {
        let claims = token::decode_token(refresh_token, TokenKind::Refresh, &self.config)?;
        let user = self.resolve(&claims).await?;
        let tokens = self.issue_tokens(user.id)?;
        debug!(user_id = %user.id, "tokens refreshed");
        Ok((user, tokens))
    }

    /// Replace the password after checking the current one. Every token
    /// issued before this call stops working; a fresh pair is returned.
    pub async fn change_password(
        &self,
        user: &User,
        current: &str,
        new_password: &str,
    ) -> VellumResult<TokenPair> {
        if !self.verify(user, current)? {
            return Err(AuthError::InvalidCredentials.into());
        }
        password::check_policy(new_password, self.config.min_password_length)?;

        let user = self
            .users
            .set_password(user.tenant_id, user.id, new_password)
            .await?;
        info!(tenant_id = %user.tenant_id, user_id = %user.id, "password changed");
        self.issue_tokens(user.id)
    }

    /// Store a reset-token hash for the account and return the raw
    /// token. `None` when no such account exists; callers respond the
    /// same way in both cases.
    pub async fn forgot_password(
        &self,
        tenant_slug: &str,
        email: &str,
    ) -> VellumResult<Option<(User, String)>> {
        let tenant = match self.active_tenant(tenant_slug).await {
            Ok(t) => t,
            Err(VellumError::AuthenticationFailed { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        let user = match self.users.get_by_email(tenant.id, email).await {
            Ok(u) if u.is_active => u,
            Ok(_) | Err(VellumError::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        let raw = token::generate_opaque_token();
        let expires_at =
            Utc::now() + Duration::seconds(self.config.reset_token_lifetime_secs as i64);
        let user = self
            .users
            .update(
                tenant.id,
                user.id,
                UpdateUser {
                    password_reset_token_hash: Some(Some(token::hash_token(&raw))),
                    password_reset_expires_at: Some(Some(expires_at)),
                    ..Default::default()
                },
            )
            .await?;
        info!(tenant_id = %tenant.id, user_id = %user.id, "password reset requested");
        Ok(Some((user, raw)))
    }

    pub async fn reset_password(&self, raw_token: &str, new_password: &str) -> VellumResult<User> {
        let user = self
            .users
            .find_by_reset_token(&token::hash_token(raw_token), Utc::now())
            .await
            .map_err(|e| match e {
                VellumError::NotFound { .. } => AuthError::InvalidActionToken.into(),
                other => other,
            })?;
        password::check_policy(new_password, self.config.min_password_length)?;

        let user = self
            .users
            .set_password(user.tenant_id, user.id, new_password)
            .await?;
        info!(tenant_id = %user.tenant_id, user_id = %user.id, "password reset");
        Ok(user)
    }

    pub async fn verify_email(&self, raw_token: &str) -> VellumResult<User> {
        let user = self
            .users
            .find_by_verification_token(&token::hash_token(raw_token))
            .await
            .map_err(|e| match e {
                VellumError::NotFound { .. } => AuthError::InvalidActionToken.into(),
                other => other,
            })?;

        self.users
            .update(
                user.tenant_id,
                user.id,
                UpdateUser {
                    is_email_verified: Some(true),
                    email_verification_token_hash: Some(None),
                    ..Default::default()
                },
            )
            .await
    }

    fn encryption_key(&self) -> Result<&[u8; 32], AuthError> {
        self.config
            .mfa_encryption_key
            .as_ref()
            .ok_or_else(|| AuthError::Crypto("two-factor encryption key is not configured".into()))
    }

    fn check_code(&self, user: &User, code: &str) -> VellumResult<bool> {
        let encrypted = user
            .two_factor_secret
            .as_deref()
            .ok_or(AuthError::TwoFactorNotSetUp)?;
        let secret = totp::decrypt_secret(self.encryption_key()?, encrypted)?;
        Ok(totp::verify_code(
            &secret,
            code,
            &self.config.totp_issuer,
            &user.email,
        )?)
    }

    /// Generate and store a new TOTP secret. Two-factor stays disabled
    /// until [`enable_two_factor`](Self::enable_two_factor) confirms a code.
    pub async fn setup_two_factor(&self, user: &User) -> VellumResult<TwoFactorSetup> {
        if user.two_factor_enabled {
            return Err(AuthError::TwoFactorAlreadyEnabled.into());
        }
        let enrollment = totp::generate_enrollment(&self.config.totp_issuer, &user.email)?;
        let encrypted = totp::encrypt_secret(self.encryption_key()?, &enrollment.secret_bytes)?;

        self.users
            .update(
                user.tenant_id,
                user.id,
                UpdateUser {
                    two_factor_secret: Some(Some(encrypted)),
                    ..Default::default()
                },
            )
            .await?;

        Ok(TwoFactorSetup {
            secret: enrollment.base32,
            otpauth_uri: enrollment.otpauth_uri,
        })
    }

    pub async fn enable_two_factor(&self, user: &User, code: &str) -> VellumResult<User> {
        if user.two_factor_enabled {
            return Err(AuthError::TwoFactorAlreadyEnabled.into());
        }
        if !self.check_code(user, code)? {
            return Err(AuthError::InvalidTwoFactorCode.into());
        }
        let user = self
            .users
            .update(
                user.tenant_id,
                user.id,
                UpdateUser {
                    two_factor_enabled: Some(true),
                    ..Default::default()
                },
            )
            .await?;
        info!(tenant_id = %user.tenant_id, user_id = %user.id, "two-factor enabled");
        Ok(user)
    }

    pub async fn disable_two_factor(
        &self,
        user: &User,
        password: &str,
        code: &str,
    ) -> VellumResult<User> {
        if !user.two_factor_enabled {
            return Err(AuthError::TwoFactorNotEnabled.into());
        }
        if !self.verify(user, password)? {
            return Err(AuthError::InvalidCredentials.into());
        }
        if !self.check_code(user, code)? {
            return Err(AuthError::InvalidTwoFactorCode.into());
        }
        let user = self
            .users
            .update(
                user.tenant_id,
                user.id,
                UpdateUser {
                    two_factor_enabled: Some(false),
                    two_factor_secret: Some(None),
                    ..Default::default()
                },
            )
            .await?;
        info!(tenant_id = %user.tenant_id, user_id = %user.id, "two-factor disabled");
        Ok(user)
    }
}
