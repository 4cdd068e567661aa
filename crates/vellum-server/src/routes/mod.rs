//! HTTP route tree. Each module exposes a `router()` for its prefix.

use std::sync::Arc;

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::get;

use crate::middleware::rate_limit;
use crate::state::AppState;

pub mod admin;
pub mod auth;
pub mod comments;
pub mod documents;
pub mod health;
pub mod messages;
pub mod notifications;
pub mod users;

/// Everything mounted under `/api/v1`.
///
/// `/auth` carries its own tighter limiter on top of the general one.
/// `/health` is outside both.
pub fn api_router(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    let auth = auth::router().layer(from_fn_with_state(
        state.auth_limiter.clone(),
        rate_limit::enforce,
    ));
    let documents =
        documents::router(state.settings.max_upload_bytes).merge(comments::document_router());

    let limited = Router::new()
        .nest("/auth", auth)
        .nest("/documents", documents)
        .nest("/comments", comments::router())
        .nest("/users", users::router())
        .nest("/notifications", notifications::router())
        .nest("/messages", messages::router())
        .nest("/admin", admin::router())
        .layer(from_fn_with_state(
            state.general_limiter.clone(),
            rate_limit::enforce,
        ));

    Router::new()
        .route("/health", get(health::health))
        .merge(limited)
}
