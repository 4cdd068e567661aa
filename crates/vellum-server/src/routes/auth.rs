//! `/auth` routes: registration, login, tokens, password and two-factor
//! management.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;
use validator::Validate;
use vellum_auth::{LoginInput, LoginOutcome, RegisterInput, TokenPair};
use vellum_mail::templates::{self, Recipient};

use crate::activity::Activity;
use crate::error::ApiResult;
use crate::extract::{ValidatedJson, not_blank};
use crate::middleware::{AuthUser, ClientInfo};
use crate::notify::send_mail;
use crate::response::{self, ApiResponse};
use crate::state::AppState;
use crate::views::UserView;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route("/verify-email", post(verify_email))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
        .route("/change-password", post(change_password))
        .route("/2fa/setup", post(setup_two_factor))
        .route("/2fa/enable", post(enable_two_factor))
        .route("/2fa/disable", post(disable_two_factor))
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 63, message = "tenant is required"))]
    pub tenant: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, max = 128, message = "password is required"))]
    pub password: String,
    #[validate(
        length(min = 1, max = 50, message = "first name must be 1 to 50 characters"),
        custom(function = "not_blank")
    )]
    pub first_name: String,
    #[validate(
        length(min = 1, max = 50, message = "last name must be 1 to 50 characters"),
        custom(function = "not_blank")
    )]
    pub last_name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 63, message = "tenant is required"))]
    pub tenant: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
    #[validate(length(equal = 6, message = "code must be 6 digits"))]
    pub two_factor_code: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "refresh token is required"))]
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TokenRequest {
    #[validate(length(min = 1, message = "token is required"))]
    pub token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(length(min = 1, max = 63, message = "tenant is required"))]
    pub tenant: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1, message = "token is required"))]
    pub token: String,
    #[validate(length(min = 1, max = 128, message = "password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "current password is required"))]
    pub current_password: String,
    #[validate(length(min = 1, max = 128, message = "new password is required"))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CodeRequest {
    #[validate(length(equal = 6, message = "code must be 6 digits"))]
    pub code: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct DisableTwoFactorRequest {
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
    #[validate(length(equal = 6, message = "code must be 6 digits"))]
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: UserView,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

#[derive(Debug, Serialize)]
pub struct TenantSummary {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: UserView,
    pub tenant: TenantSummary,
}

#[derive(Debug, Serialize)]
pub struct TwoFactorChallenge {
    pub requires_two_factor: bool,
    pub user_id: Uuid,
}

async fn register(
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let registration = state
        .auth
        .register(RegisterInput {
            tenant_slug: req.tenant,
            email: req.email,
            password: req.password,
            first_name: req.first_name.trim().to_string(),
            last_name: req.last_name.trim().to_string(),
        })
        .await?;
    let user = registration.user;

    let url = state.app_url(&format!(
        "/verify-email?token={}",
        registration.verification_token
    ));
    let name = user.full_name();
    send_mail(
        &state,
        templates::email_verification(
            &Recipient {
                email: &user.email,
                name: &name,
            },
            &url,
        ),
    );

    Activity::new(&state, user.tenant_id, Some(user.id), "auth.register")
        .resource("user", user.id)
        .client(&client)
        .record(&state);

    Ok(response::created(UserView::from(user)))
}

async fn login(
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> ApiResult<axum::response::Response> {
    let outcome = state
        .auth
        .login(LoginInput {
            tenant_slug: req.tenant,
            email: req.email,
            password: req.password,
            two_factor_code: req.two_factor_code,
        })
        .await?;

    match outcome {
        LoginOutcome::TwoFactorRequired { user_id } => Ok(response::ok(TwoFactorChallenge {
            requires_two_factor: true,
            user_id,
        })
        .into_response()),
        LoginOutcome::Authenticated { user, tokens } => {
            Activity::new(&state, user.tenant_id, Some(user.id), "auth.login")
                .resource("user", user.id)
                .client(&client)
                .record(&state);

            Ok(response::ok(SessionResponse {
                user: user.into(),
                tokens,
            })
            .into_response())
        }
    }
}

async fn refresh(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<RefreshRequest>,
) -> ApiResult<Json<ApiResponse<SessionResponse>>> {
    let (user, tokens) = state.auth.refresh(&req.refresh_token).await?;
    Ok(response::ok(SessionResponse {
        user: user.into(),
        tokens,
    }))
}

/// Tokens are stateless; logging out is recorded and the client drops
/// its tokens.
async fn logout(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    client: ClientInfo,
) -> impl IntoResponse {
    Activity::new(&state, caller.tenant_id(), Some(caller.id()), "auth.logout")
        .resource("user", caller.id())
        .client(&client)
        .record(&state);
    response::message("Logged out")
}

async fn me(caller: AuthUser) -> Json<ApiResponse<MeResponse>> {
    response::ok(MeResponse {
        tenant: TenantSummary {
            id: caller.tenant.id,
            name: caller.tenant.name,
            slug: caller.tenant.slug,
        },
        user: caller.user.into(),
    })
}

async fn verify_email(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<TokenRequest>,
) -> ApiResult<impl IntoResponse> {
    let user = state.auth.verify_email(&req.token).await?;
    Activity::new(&state, user.tenant_id, Some(user.id), "auth.verify_email")
        .resource("user", user.id)
        .record(&state);
    Ok(response::ok(UserView::from(user)))
}

async fn forgot_password(
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    ValidatedJson(req): ValidatedJson<ForgotPasswordRequest>,
) -> ApiResult<impl IntoResponse> {
    if let Some((user, token)) = state.auth.forgot_password(&req.tenant, &req.email).await? {
        let url = state.app_url(&format!("/reset-password?token={token}"));
        let minutes = state.auth.config().reset_token_lifetime_secs / 60;
        let name = user.full_name();
        send_mail(
            &state,
            templates::password_reset(
                &Recipient {
                    email: &user.email,
                    name: &name,
                },
                &url,
                minutes,
            ),
        );
        Activity::new(&state, user.tenant_id, Some(user.id), "auth.forgot_password")
            .resource("user", user.id)
            .client(&client)
            .record(&state);
    }
    Ok(response::message(
        "If the account exists, a password reset link has been sent",
    ))
}

async fn reset_password(
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    ValidatedJson(req): ValidatedJson<ResetPasswordRequest>,
) -> ApiResult<impl IntoResponse> {
    let user = state.auth.reset_password(&req.token, &req.password).await?;
    info!(tenant_id = %user.tenant_id, user_id = %user.id, "Password reset");
    Activity::new(&state, user.tenant_id, Some(user.id), "auth.reset_password")
        .resource("user", user.id)
        .client(&client)
        .record(&state);
    Ok(response::message("Password has been reset"))
}

async fn change_password(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    client: ClientInfo,
    ValidatedJson(req): ValidatedJson<ChangePasswordRequest>,
) -> ApiResult<impl IntoResponse> {
    let tokens = state
        .auth
        .change_password(&caller.user, &req.current_password, &req.new_password)
        .await?;
    Activity::new(&state, caller.tenant_id(), Some(caller.id()), "auth.change_password")
        .resource("user", caller.id())
        .client(&client)
        .record(&state);
    Ok(response::ok(tokens))
}

async fn setup_two_factor(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
) -> ApiResult<impl IntoResponse> {
    let setup = state.auth.setup_two_factor(&caller.user).await?;
    Ok(response::ok(json!({
        "secret": setup.secret,
        "otpauth_uri": setup.otpauth_uri,
    })))
}

async fn enable_two_factor(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    client: ClientInfo,
    ValidatedJson(req): ValidatedJson<CodeRequest>,
) -> ApiResult<impl IntoResponse> {
    let user = state.auth.enable_two_factor(&caller.user, &req.code).await?;
    Activity::new(&state, user.tenant_id, Some(user.id), "auth.2fa_enable")
        .resource("user", user.id)
        .client(&client)
        .record(&state);
    Ok(response::ok(UserView::from(user)))
}

async fn disable_two_factor(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    client: ClientInfo,
    ValidatedJson(req): ValidatedJson<DisableTwoFactorRequest>,
) -> ApiResult<impl IntoResponse> {
    let user = state
        .auth
        .disable_two_factor(&caller.user, &req.password, &req.code)
        .await?;
    Activity::new(&state, user.tenant_id, Some(user.id), "auth.2fa_disable")
        .resource("user", user.id)
        .client(&client)
        .record(&state);
    Ok(response::ok(UserView::from(user)))
}
