use axum::{
    routing::{get, post},
    Router,
};

pub mod cleanup;
pub mod jobs;
pub mod system;

/// Endpoint summary, logged at startup.
pub const ENDPOINTS: &[(&str, &str, &str)] = &[
    ("GET", "/api/jobs", "Get all jobs"),
    ("GET", "/api/jobs/:id", "Get specific job"),
    ("GET", "/api/jobs/:id/schedule", "Get estimated end and deletion time"),
    ("POST", "/api/jobs", "Create new job"),
    ("PUT", "/api/jobs/:id", "Update job"),
    ("DELETE", "/api/jobs/:id", "Delete job"),
    ("POST", "/api/cleanup", "Manual cleanup"),
];

/// Router for everything under `/api`.
pub fn router() -> Router {
    Router::new()
        .route("/jobs", get(jobs::list_jobs).post(jobs::create_job))
        .route(
            "/jobs/:id",
            get(jobs::get_job).put(jobs::update_job).delete(jobs::delete_job),
        )
        .route("/jobs/:id/schedule", get(jobs::get_schedule))
        .route("/cleanup", post(cleanup::run_cleanup))
}
