use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use jobkeeper_core::JobId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

fn parse_path_id(id: String) -> Result<JobId, axum::response::Response> {
    JobId::new(id).map_err(|_| errors::job_not_found())
}

pub async fn list_jobs(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.with_store(|store| store.all()).await {
        Ok(jobs) => (StatusCode::OK, Json(jobs)).into_response(),
        Err(resp) => resp,
    }
}

pub async fn get_job(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    match services.with_store(move |store| store.get(&id)).await {
        Ok(Some(job)) => (StatusCode::OK, Json(job)).into_response(),
        Ok(None) => errors::job_not_found(),
        Err(resp) => resp,
    }
}

pub async fn get_schedule(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let policy = services.policy();
    match services.with_store(move |store| store.get(&id)).await {
        Ok(Some(job)) => (
            StatusCode::OK,
            Json(dto::ScheduleResponse {
                schedule: policy.schedule(&job),
                id: job.id,
            }),
        )
            .into_response(),
        Ok(None) => errors::job_not_found(),
        Err(resp) => resp,
    }
}

pub async fn create_job(
    Extension(services): Extension<Arc<AppServices>>,
    body: Bytes,
) -> axum::response::Response {
    let job = match dto::parse_new_job(&body) {
        Ok(job) => job,
        Err(e) => return errors::domain_error_to_response(e),
    };

    let job_id = job.id.clone();
    match services.with_store(move |store| store.create(job)).await {
        Ok(Ok(created)) => {
            tracing::info!(job_id = %job_id, "job created");
            (StatusCode::CREATED, Json(created)).into_response()
        }
        Ok(Err(e)) => errors::store_error_to_response(e),
        Err(resp) => resp,
    }
}

pub async fn update_job(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Bytes,
) -> axum::response::Response {
    let id = match parse_path_id(id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let job = match dto::parse_replacement_job(&body, &id) {
        Ok(job) => job,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.with_store(move |store| store.update(&id, job)).await {
        Ok(Some(updated)) => {
            tracing::info!(job_id = %updated.id, "job updated");
            (StatusCode::OK, Json(updated)).into_response()
        }
        Ok(None) => errors::job_not_found(),
        Err(resp) => resp,
    }
}

pub async fn delete_job(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let job_id = id.clone();
    match services.with_store(move |store| store.delete(&id)).await {
        Ok(true) => {
            tracing::info!(job_id = %job_id, "job deleted");
            (StatusCode::OK, Json(dto::DeleteResponse { success: true })).into_response()
        }
        Ok(false) => errors::job_not_found(),
        Err(resp) => resp,
    }
}
