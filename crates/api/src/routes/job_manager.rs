//! Handlers for the `/job-manager` surface.
//!
//! Consumed by remote workers (queue get/put, progress sync) and by the
//! dashboard (job details, terminal-queue cleanup). Queue names are the
//! five lifecycle status names; anything else is a 404.

use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;

use streamlab_jobs::{JobRecord, JobStatus};

use crate::coordinator::JobDetails;
use crate::error::ApiResult;
use crate::state::AppState;

/// Long-poll window applied when a queue GET carries no `timeout`.
const DEFAULT_QUEUE_TIMEOUT_SECS: f64 = 10.0;

/// Upper bound on the server-side long-poll window.
const MAX_QUEUE_TIMEOUT_SECS: f64 = 300.0;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/job-manager/queue/{queue_name}",
            get(get_queue).put(put_queue),
        )
        .route("/job-manager/update", put(update_job))
        .route("/job-manager/job/details", get(job_details))
        .route("/job-manager/jobs/clear", post(clear_jobs))
}

// ---------------------------------------------------------------------------
// Queue get / put
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct QueueQuery {
    /// Server-side long-poll window in seconds.
    timeout: Option<f64>,
}

/// GET /job-manager/queue/{queue_name}?timeout={seconds}
///
/// Blocking dequeue bounded by the caller-supplied timeout. Responds
/// 204 when the queue stayed empty for the whole window -- the polling
/// client treats that as "retry", not as an error.
async fn get_queue(
    State(state): State<AppState>,
    Path(queue_name): Path<String>,
    Query(query): Query<QueueQuery>,
) -> ApiResult<Response> {
    let queue: JobStatus = queue_name.parse()?;
    let window = query
        .timeout
        .unwrap_or(DEFAULT_QUEUE_TIMEOUT_SECS)
        .clamp(0.0, MAX_QUEUE_TIMEOUT_SECS);

    match state
        .store
        .get(queue, Some(Duration::from_secs_f64(window)))
        .await
    {
        Some(record) => Ok(Json(record).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// PUT /job-manager/queue/{queue_name}
///
/// Move the posted record into the named queue, purging any previous
/// residency. This is how remote workers record lifecycle transitions.
async fn put_queue(
    State(state): State<AppState>,
    Path(queue_name): Path<String>,
    Json(record): Json<JobRecord>,
) -> ApiResult<StatusCode> {
    let queue: JobStatus = queue_name.parse()?;
    tracing::debug!(job_id = %record.job_id, queue = %queue, "Queue put");
    state.store.put(queue, &record).await;
    Ok(StatusCode::OK)
}

// ---------------------------------------------------------------------------
// Update / details / clear
// ---------------------------------------------------------------------------

/// PUT /job-manager/update
///
/// Merge the posted record into the cached one without changing its
/// queue membership. The high-frequency progress-sync path.
async fn update_job(
    State(state): State<AppState>,
    Json(record): Json<JobRecord>,
) -> ApiResult<Json<JobRecord>> {
    let merged = state.store.update(&record).await?;
    Ok(Json(merged))
}

#[derive(Debug, Deserialize)]
struct DetailsQuery {
    job: String,
}

/// GET /job-manager/job/details?job={job_id}
async fn job_details(
    State(state): State<AppState>,
    Query(query): Query<DetailsQuery>,
) -> ApiResult<Json<JobDetails>> {
    let details = state.coordinator.job_details(&query.job).await?;
    Ok(Json(details))
}

/// POST /job-manager/jobs/clear
///
/// Drain the three terminal queues and return the drained records.
/// Scheduled and running jobs are untouched.
async fn clear_jobs(State(state): State<AppState>) -> Json<Vec<JobRecord>> {
    let cleared = state.store.clear_jobs().await;
    tracing::info!(count = cleared.len(), "Cleared finished jobs");
    Json(cleared)
}
