//! `/users` routes.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, patch};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;
use vellum_core::error::VellumError;
use vellum_core::models::user::{UpdateUser, UserFilter, UserRole};
use vellum_core::repository::UserRepository;

use crate::activity::Activity;
use crate::error::ApiResult;
use crate::extract::{ApiPath, ApiQuery, ValidatedJson, ValidatedQuery, not_blank};
use crate::middleware::{AdminUser, AuthUser, ClientInfo};
use crate::response::{self, PageQuery};
use crate::state::AppState;
use crate::views::UserView;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list))
        .route("/me", patch(update_me))
        .route("/{id}", get(show))
        .route("/{id}/role", patch(set_role))
        .route("/{id}/status", patch(set_status))
}

#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    pub search: Option<String>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
}

async fn list(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    ValidatedQuery(page): ValidatedQuery<PageQuery>,
    ApiQuery(query): ApiQuery<UserListQuery>,
) -> ApiResult<impl IntoResponse> {
    let filter = UserFilter {
        search: query.search,
        role: query.role,
        is_active: query.is_active,
    };
    let result = state
        .users
        .list(caller.tenant_id(), filter, page.pagination())
        .await?;
    Ok(response::paginated(result.map(UserView::from)))
}

async fn show(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let user = state.users.get_by_id(caller.tenant_id(), id).await?;
    Ok(response::ok(UserView::from(user)))
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(
        length(min = 1, max = 50, message = "first name must be 1 to 50 characters"),
        custom(function = "not_blank")
    )]
    pub first_name: Option<String>,
    #[validate(
        length(min = 1, max = 50, message = "last name must be 1 to 50 characters"),
        custom(function = "not_blank")
    )]
    pub last_name: Option<String>,
}

async fn update_me(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    ValidatedJson(req): ValidatedJson<UpdateProfileRequest>,
) -> ApiResult<impl IntoResponse> {
    let user = state
        .users
        .update(
            caller.tenant_id(),
            caller.id(),
            UpdateUser {
                first_name: req.first_name.map(|n| n.trim().to_string()),
                last_name: req.last_name.map(|n| n.trim().to_string()),
                ..Default::default()
            },
        )
        .await?;
    Ok(response::ok(UserView::from(user)))
}

#[derive(Debug, Deserialize, Validate)]
pub struct RoleRequest {
    pub role: UserRole,
}

async fn set_role(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    client: ClientInfo,
    ApiPath(id): ApiPath<Uuid>,
    ValidatedJson(req): ValidatedJson<RoleRequest>,
) -> ApiResult<impl IntoResponse> {
    let target = state.users.find_by_id(id).await?;
    let user = state
        .users
        .update(
            target.tenant_id,
            id,
            UpdateUser {
                role: Some(req.role),
                ..Default::default()
            },
        )
        .await?;

    info!(admin_id = %admin.id(), user_id = %id, role = %req.role, "User role changed");
    Activity::new(&state, target.tenant_id, Some(admin.id()), "user.role")
        .resource("user", id)
        .client(&client)
        .metadata(serde_json::json!({ "role": req.role }))
        .record(&state);
    Ok(response::ok(UserView::from(user)))
}

#[derive(Debug, Deserialize, Validate)]
pub struct StatusRequest {
    pub is_active: bool,
}

async fn set_status(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    client: ClientInfo,
    ApiPath(id): ApiPath<Uuid>,
    ValidatedJson(req): ValidatedJson<StatusRequest>,
) -> ApiResult<impl IntoResponse> {
    if id == admin.id() && !req.is_active {
        return Err(VellumError::validation("You cannot deactivate your own account").into());
    }
    let target = state.users.find_by_id(id).await?;
    let user = state
        .users
        .update(
            target.tenant_id,
            id,
            UpdateUser {
                is_active: Some(req.is_active),
                ..Default::default()
            },
        )
        .await?;

    info!(
        admin_id = %admin.id(),
        user_id = %id,
        is_active = req.is_active,
        "User status changed"
    );
    let action = if req.is_active {
        "user.activate"
    } else {
        "user.deactivate"
    };
    Activity::new(&state, target.tenant_id, Some(admin.id()), action)
        .resource("user", id)
        .client(&client)
        .record(&state);
    Ok(response::ok(UserView::from(user)))
}
