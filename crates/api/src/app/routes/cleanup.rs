use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use crate::app::dto::CleanupResponse;
use crate::app::errors;
use crate::app::services::AppServices;

/// Run a retention sweep now and report how many jobs it removed.
pub async fn run_cleanup(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.cleanup().run_now().await {
        Ok(report) => (
            StatusCode::OK,
            Json(CleanupResponse {
                deleted: report.removed_count(),
            }),
        )
            .into_response(),
        Err(e) => errors::cleanup_error_to_response(e),
    }
}
