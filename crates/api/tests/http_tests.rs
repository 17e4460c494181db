//! Handler tests for the `/job-manager` HTTP surface, driven through
//! the real router with `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use streamlab_api::{build_app_router, AppState, Coordinator, ServerConfig};
use streamlab_events::StateBus;
use streamlab_jobs::{JobConfig, JobRecord, JobStatus, JobStore, ShellConfig};

async fn test_app(tag: &str) -> (Router, AppState) {
    let jobs_dir =
        std::env::temp_dir().join(format!("streamlab-http-tests-{}-{tag}", std::process::id()));

    let config = ServerConfig {
        host: "127.0.0.1".into(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".into()],
        jobs_dir: jobs_dir.clone(),
        local_workers: 0,
    };

    let bus = Arc::new(StateBus::default());
    let store = Arc::new(JobStore::new(Arc::clone(&bus)));
    let coordinator = Arc::new(
        Coordinator::new(Arc::clone(&store), jobs_dir)
            .await
            .expect("coordinator"),
    );
    let state = AppState {
        store,
        coordinator,
        bus,
    };
    (build_app_router(state.clone(), &config), state)
}

fn shell_record(id: &str, cmd: &str) -> JobRecord {
    JobRecord::new(id, JobConfig::Shell(ShellConfig { cmd: cmd.into() }))
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("collect body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}

fn put_record(uri: &str, record: &JobRecord) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            serde_json::to_vec(record).expect("serialize record"),
        ))
        .expect("request")
}

#[tokio::test]
async fn health_reports_ok() {
    let (app, _) = test_app("health").await;
    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn empty_queue_returns_204() {
    let (app, _) = test_app("empty").await;
    let response = app
        .oneshot(
            Request::get("/job-manager/queue/scheduled?timeout=0")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn unknown_queue_is_404() {
    let (app, _) = test_app("unknown-queue").await;
    let response = app
        .oneshot(
            Request::get("/job-manager/queue/pending?timeout=0")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["code"], "UNKNOWN_QUEUE");
}

#[tokio::test]
async fn put_then_get_round_trips_a_record() {
    let (app, _) = test_app("roundtrip").await;
    let record = shell_record("0000000000000042", "exit 0");

    let response = app
        .clone()
        .oneshot(put_record("/job-manager/queue/scheduled", &record))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::get("/job-manager/queue/scheduled?timeout=0")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["job_id"], "0000000000000042");
    assert_eq!(body["type"], "shell");
    assert_eq!(body["config"]["cmd"], "exit 0");
}

#[tokio::test]
async fn update_merges_progress_without_moving_the_job() {
    let (app, state) = test_app("update").await;
    let record = shell_record("0000000000000007", "sleep 5");
    state.store.put(JobStatus::Running, &record).await;

    let mut progress = record.clone();
    progress.mark_running();
    progress.progress = Some(0.4);

    let response = app
        .clone()
        .oneshot(put_record("/job-manager/update", &progress))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["progress"], 0.4);

    // Still in the running queue, now with progress merged.
    let found = state
        .store
        .find_by_id("0000000000000007")
        .await
        .expect("cached");
    assert_eq!(found.progress, Some(0.4));
    assert_eq!(found.status, JobStatus::Running);
}

#[tokio::test]
async fn update_for_unknown_job_is_404() {
    let (app, _) = test_app("update-unknown").await;
    let record = shell_record("9999999999999999", "true");
    let response = app
        .oneshot(put_record("/job-manager/update", &record))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn details_include_record_and_job_name() {
    let (app, state) = test_app("details").await;
    let record = state
        .coordinator
        .schedule(JobConfig::Shell(ShellConfig { cmd: "true".into() }))
        .await;

    let response = app
        .oneshot(
            Request::get(format!("/job-manager/job/details?job={}", record.job_id))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["job_id"], record.job_id.as_str());
    assert_eq!(body["job_name"], format!("shell-{}", record.job_id));
    assert_eq!(body["status"], "scheduled");
}

#[tokio::test]
async fn details_for_unknown_job_is_404() {
    let (app, _) = test_app("details-unknown").await;
    let response = app
        .oneshot(
            Request::get("/job-manager/job/details?job=missing")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["code"], "JOB_NOT_FOUND");
}

#[tokio::test]
async fn clear_drains_only_finished_jobs() {
    let (app, state) = test_app("clear").await;
    let mut finished = shell_record("0000000000000001", "true");
    finished.mark_successful(None);
    state.store.put(JobStatus::Successful, &finished).await;
    state
        .store
        .put(JobStatus::Scheduled, &shell_record("0000000000000002", "true"))
        .await;

    let response = app
        .oneshot(
            Request::post("/job-manager/jobs/clear")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let cleared = body.as_array().expect("array");
    assert_eq!(cleared.len(), 1);
    assert_eq!(cleared[0]["job_id"], "0000000000000001");

    // The scheduled job is untouched.
    let remaining = state
        .store
        .get(JobStatus::Scheduled, None)
        .await
        .expect("scheduled job");
    assert_eq!(remaining.job_id, "0000000000000002");
}
