//! Worker-facing queue endpoints.

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{StatusCode, Uri},
    routing::{get, post},
};

use crate::error::{AppError, AppResult};
use crate::models::{JobData, JobRecord};
use crate::state::AppState;

/// Routes relative to the queue's base path.
///
/// A known path with the wrong method is answered like an unknown path.
pub fn queue_routes<J: JobData, R: JobData>() -> Router<AppState<J, R>> {
    Router::new()
        .route("/jobs", get(fetch_new_jobs::<J, R>).fallback(not_found))
        .route("/results", post(submit_result::<J, R>).fallback(not_found))
}

/// GET {base}/jobs - Claim every new job
async fn fetch_new_jobs<J: JobData, R: JobData>(
    State(state): State<AppState<J, R>>,
) -> Json<Vec<JobRecord<J, R>>> {
    Json(state.queue.fetch_new_jobs())
}

/// POST {base}/results - Record the outcome of a pending job
async fn submit_result<J: JobData, R: JobData>(
    State(state): State<AppState<J, R>>,
    payload: Result<Json<JobRecord<J, R>>, JsonRejection>,
) -> AppResult<StatusCode> {
    let Json(record) = payload?;
    let job_id = record.id.clone();

    state.queue.submit_result(record).inspect_err(|e| {
        tracing::warn!(job_id = %job_id, error = %e, "Rejected job result");
    })?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound {
        entity: "route".to_string(),
        field: "path".to_string(),
        value: uri.path().to_string(),
    }
}
