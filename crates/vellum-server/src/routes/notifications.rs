//! `/notifications` routes. Every operation is limited to the caller's
//! own notifications.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{delete, get, patch};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vellum_core::repository::NotificationRepository;

use crate::error::ApiResult;
use crate::extract::{ApiPath, ApiQuery, ValidatedQuery};
use crate::middleware::AuthUser;
use crate::response::{self, PageQuery};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list))
        .route("/unread-count", get(unread_count))
        .route("/read-all", patch(mark_all_read))
        .route("/{id}/read", patch(mark_read))
        .route("/{id}", delete(remove))
}

#[derive(Debug, Default, Deserialize)]
pub struct NotificationListQuery {
    #[serde(default)]
    pub unread: bool,
}

#[derive(Debug, Serialize)]
struct Count {
    count: u64,
}

async fn list(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    ValidatedQuery(page): ValidatedQuery<PageQuery>,
    ApiQuery(query): ApiQuery<NotificationListQuery>,
) -> ApiResult<impl IntoResponse> {
    let result = state
        .notifications
        .list_for_recipient(caller.tenant_id(), caller.id(), query.unread, page.pagination())
        .await?;
    Ok(response::paginated(result))
}

async fn unread_count(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
) -> ApiResult<impl IntoResponse> {
    let count = state
        .notifications
        .unread_count(caller.tenant_id(), caller.id())
        .await?;
    Ok(response::ok(Count { count }))
}

async fn mark_read(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let notification = state
        .notifications
        .mark_read(caller.tenant_id(), caller.id(), id)
        .await?;
    Ok(response::ok(notification))
}

async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
) -> ApiResult<impl IntoResponse> {
    let count = state
        .notifications
        .mark_all_read(caller.tenant_id(), caller.id())
        .await?;
    Ok(response::ok(Count { count }))
}

async fn remove(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    state
        .notifications
        .delete(caller.tenant_id(), caller.id(), id)
        .await?;
    Ok(response::message("Notification deleted"))
}
