//! Vellum HTTP/JSON API server.
//!
//! The binary in `main.rs` wires configuration, storage and mail into an
//! [`AppState`] and serves [`router`]. Integration tests build the same
//! router over in-memory backends.

pub mod activity;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod notify;
pub mod response;
pub mod routes;
pub mod state;
pub mod views;

use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderValue, Method, Uri, header};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use vellum_core::error::VellumError;

pub use state::AppState;

use crate::error::ApiError;

/// Build the complete application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_router(&state))
        .fallback(not_found)
        .with_state(state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.settings.cors_origins))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

async fn not_found(uri: Uri) -> ApiError {
    VellumError::not_found("route", uri.path()).into()
}

/// Any origin when none are configured, otherwise exactly the listed
/// ones. Unparsable entries are skipped.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    if origins.is_empty() {
        return layer.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    layer.allow_origin(AllowOrigin::list(origins))
}
