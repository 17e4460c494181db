use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use streamlab_jobs::JobError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`JobError`] and implements [`IntoResponse`] to produce
/// consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A job-framework error.
    #[error(transparent)]
    Job(#[from] JobError),
}

/// Convenience type alias for handler return values.
pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let ApiError::Job(err) = self;
        let (status, code, message) = match &err {
            JobError::NotFound(id) => (
                StatusCode::NOT_FOUND,
                "JOB_NOT_FOUND",
                format!("Job {id} not found"),
            ),
            JobError::UnknownQueue(name) => (
                StatusCode::NOT_FOUND,
                "UNKNOWN_QUEUE",
                format!("No queue named {name}"),
            ),
            JobError::Serialization(e) => (
                StatusCode::BAD_REQUEST,
                "BAD_RECORD",
                format!("Malformed job record: {e}"),
            ),
            other => {
                tracing::error!(error = %other, "Internal job-manager error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
