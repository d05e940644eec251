use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use jobkeeper_core::DomainError;
use jobkeeper_infra::jobs::{CleanupError, JobStoreError};

pub fn store_error_to_response(err: JobStoreError) -> axum::response::Response {
    match err {
        JobStoreError::AlreadyExists(id) => json_error(
            StatusCode::CONFLICT,
            "conflict",
            format!("job {id} already exists"),
        ),
        JobStoreError::Load(msg) | JobStoreError::Persistence(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", msg)
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "malformed_input", err.to_string())
}

pub fn cleanup_error_to_response(err: CleanupError) -> axum::response::Response {
    internal("cleanup failed", err)
}

pub fn job_not_found() -> axum::response::Response {
    json_error(StatusCode::NOT_FOUND, "not_found", "Job not found")
}

pub fn internal(context: &str, err: impl std::fmt::Display) -> axum::response::Response {
    tracing::error!(error = %err, "{context}");
    json_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal_error",
        format!("{context}: {err}"),
    )
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
