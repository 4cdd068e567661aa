//! The single place where errors become HTTP responses.

use axum::Json;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;
use vellum_core::error::{FieldError, VellumError};
use vellum_mail::MailError;
use vellum_storage::StorageError;

#[derive(Debug)]
pub struct ApiError(pub VellumError);

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Serialize)]
struct ErrorBody<'a> {
    status: &'static str,
    message: String,
    #[serde(skip_serializing_if = "<[FieldError]>::is_empty")]
    errors: &'a [FieldError],
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            VellumError::Validation { .. } => StatusCode::BAD_REQUEST,
            VellumError::AuthenticationFailed { .. } => StatusCode::UNAUTHORIZED,
            VellumError::AuthorizationDenied { .. } | VellumError::TenantContext => {
                StatusCode::FORBIDDEN
            }
            VellumError::NotFound { .. } => StatusCode::NOT_FOUND,
            VellumError::AlreadyExists { .. } => StatusCode::CONFLICT,
            VellumError::AccountLocked { .. } => StatusCode::LOCKED,
            VellumError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            VellumError::Database(_)
            | VellumError::Storage(_)
            | VellumError::Mail(_)
            | VellumError::Crypto(_)
            | VellumError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = if self.0.is_operational() {
            match &self.0 {
                VellumError::Validation { message, .. } => message.clone(),
                VellumError::AuthenticationFailed { reason }
                | VellumError::AuthorizationDenied { reason } => reason.clone(),
                VellumError::NotFound { entity, .. } => format!("{entity} not found"),
                VellumError::AlreadyExists { entity } => format!("{entity} already exists"),
                other => other.to_string(),
            }
        } else {
            error!(error = %self.0, "Unhandled error while serving request");
            "Internal server error".to_string()
        };

        let errors: &[FieldError] = match &self.0 {
            VellumError::Validation { errors, .. } => errors,
            _ => &[],
        };

        let body = ErrorBody {
            status: "error",
            message,
            errors,
        };
        (status, Json(body)).into_response()
    }
}

impl From<VellumError> for ApiError {
    fn from(err: VellumError) -> Self {
        Self(err)
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        Self(err.into())
    }
}

impl From<MailError> for ApiError {
    fn from(err: MailError) -> Self {
        Self(err.into())
    }
}

macro_rules! rejection_as_bad_request {
    ($($rejection:ty),+ $(,)?) => {
        $(
            impl From<$rejection> for ApiError {
                fn from(rejection: $rejection) -> Self {
                    Self(VellumError::validation(rejection.body_text()))
                }
            }
        )+
    };
}

rejection_as_bad_request!(
    JsonRejection,
    QueryRejection,
    PathRejection,
    MultipartRejection,
    MultipartError,
);

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn statuses_follow_error_class() {
        let cases = [
            (VellumError::validation("bad"), StatusCode::BAD_REQUEST),
            (VellumError::unauthenticated("no"), StatusCode::UNAUTHORIZED),
            (VellumError::denied("no"), StatusCode::FORBIDDEN),
            (VellumError::not_found("document", "x"), StatusCode::NOT_FOUND),
            (
                VellumError::AccountLocked { until: Utc::now() },
                StatusCode::LOCKED,
            ),
            (VellumError::RateLimited, StatusCode::TOO_MANY_REQUESTS),
            (
                VellumError::Database("connection reset".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).status_code(), status);
        }
    }

    #[tokio::test]
    async fn internal_details_are_hidden() {
        let response = ApiError(VellumError::Database("password=hunter2".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "Internal server error");
        assert!(body.get("errors").is_none());
    }

    #[tokio::test]
    async fn field_errors_are_listed() {
        let err = VellumError::Validation {
            message: "Validation failed".into(),
            errors: vec![FieldError {
                field: "email".into(),
                message: "must be a valid email".into(),
            }],
        };
        let response = ApiError(err).into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["errors"][0]["field"], "email");
    }
}
