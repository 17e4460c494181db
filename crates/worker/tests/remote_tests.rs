//! Remote-protocol tests: a real coordinator on an ephemeral port, a
//! [`RemoteQueues`] client polling it, and the shared worker loop
//! executing jobs end to end over HTTP.

use std::sync::Arc;
use std::time::Duration;

use streamlab_api::{build_app_router, AppState, Coordinator, ServerConfig};
use streamlab_events::StateBus;
use streamlab_jobs::{
    CallbackRegistry, JobConfig, JobQueues, JobStatus, JobStore, ShellConfig, WorkerPool,
};
use streamlab_worker::RemoteQueues;

/// Pacing for tests: fast retries, no effective sync throttle.
const FAST: Duration = Duration::from_millis(50);

fn temp_dir(tag: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("streamlab-remote-tests-{}-{tag}", std::process::id()))
}

/// Boot a coordinator with no local workers and serve it on an
/// ephemeral port. Returns its base URL and state.
async fn spawn_coordinator(tag: &str) -> (String, AppState) {
    let jobs_dir = temp_dir(tag);
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
    let app = build_app_router(state.clone(), &config);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    (format!("http://{addr}"), state)
}

#[tokio::test(flavor = "multi_thread")]
async fn remote_worker_executes_a_scheduled_job() {
    let (url, state) = spawn_coordinator("end-to-end").await;
    let queues = Arc::new(RemoteQueues::with_intervals(url, FAST, FAST));
    WorkerPool::start(
        1,
        queues,
        Arc::new(CallbackRegistry::new()),
        temp_dir("end-to-end-worker"),
    );

    let handle = state
        .coordinator
        .schedule(JobConfig::Shell(ShellConfig {
            cmd: "echo over the wire".into(),
        }))
        .await;

    tokio::time::timeout(Duration::from_secs(10), handle.wait_done())
        .await
        .expect("job should finish within 10s");

    let record = state
        .store
        .find_by_id(&handle.job_id)
        .await
        .expect("cached");
    assert_eq!(record.status, JobStatus::Successful);
    assert_eq!(record.output.as_deref(), Some("over the wire"));
    assert!(record.run_at.is_some());
    assert!(record.finished_at.is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn remote_worker_records_failures() {
    let (url, state) = spawn_coordinator("failure").await;
    let queues = Arc::new(RemoteQueues::with_intervals(url, FAST, FAST));
    WorkerPool::start(
        1,
        queues,
        Arc::new(CallbackRegistry::new()),
        temp_dir("failure-worker"),
    );

    let handle = state
        .coordinator
        .schedule(JobConfig::Shell(ShellConfig { cmd: "exit 7".into() }))
        .await;

    tokio::time::timeout(Duration::from_secs(10), handle.wait_done())
        .await
        .expect("job should finish within 10s");

    let record = state
        .store
        .find_by_id(&handle.job_id)
        .await
        .expect("cached");
    assert_eq!(record.status, JobStatus::Failed);
    assert!(record.error.expect("error recorded").contains("status Some(7)"));
    assert_eq!(record.output, None);
}

#[tokio::test(flavor = "multi_thread")]
async fn get_retries_through_empty_polls() {
    let (url, state) = spawn_coordinator("retry").await;
    let queues = RemoteQueues::with_intervals(url, FAST, FAST);

    // Schedule only after the client has eaten a few 204s.
    let coordinator = Arc::clone(&state.coordinator);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        coordinator
            .schedule(JobConfig::Shell(ShellConfig { cmd: "true".into() }))
            .await;
    });

    let got = tokio::time::timeout(
        Duration::from_secs(10),
        queues.get(JobStatus::Scheduled, Some(Duration::from_millis(50))),
    )
    .await
    .expect("get should return once a job arrives")
    .expect("get never errors");
    assert!(got.is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn terminal_put_fires_the_client_side_latch() {
    let (url, state) = spawn_coordinator("latch").await;
    let queues = RemoteQueues::with_intervals(url, FAST, FAST);

    state
        .coordinator
        .schedule(JobConfig::Shell(ShellConfig { cmd: "true".into() }))
        .await;

    // Fetch the job like a worker; the absorbed record enters the cache.
    let mut record = queues
        .get(JobStatus::Scheduled, Some(Duration::from_secs(1)))
        .await
        .expect("get never errors")
        .expect("job available");
    let observer = queues.find_by_id(&record.job_id).await.expect("cached");
    assert!(!observer.is_done());

    record.mark_running();
    queues
        .put(JobStatus::Running, &record)
        .await
        .expect("put running");
    assert!(!observer.is_done());

    record.mark_successful(Some("done".into()));
    queues
        .put(JobStatus::Successful, &record)
        .await
        .expect("put successful");
    assert!(observer.is_done());
}

#[tokio::test(flavor = "multi_thread")]
async fn sync_job_is_throttled_per_job() {
    let (url, state) = spawn_coordinator("throttle").await;
    // Long throttle window: only the first sync per job goes through.
    let queues =
        RemoteQueues::with_intervals(url, FAST, Duration::from_secs(60));

    let handle = state
        .coordinator
        .schedule(JobConfig::Shell(ShellConfig { cmd: "true".into() }))
        .await;
    let mut record = queues
        .get(JobStatus::Scheduled, Some(Duration::from_secs(1)))
        .await
        .expect("get never errors")
        .expect("job available");
    record.mark_running();
    queues
        .put(JobStatus::Running, &record)
        .await
        .expect("put running");

    record.progress = Some(0.25);
    queues.sync_job(&record).await.expect("first sync");
    record.progress = Some(0.75);
    queues.sync_job(&record).await.expect("coalesced sync");

    let server_side = state
        .store
        .find_by_id(&handle.job_id)
        .await
        .expect("cached");
    assert_eq!(server_side.progress, Some(0.25), "second sync was coalesced");
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_cached_job_is_a_hard_error() {
    let (url, _state) = spawn_coordinator("unknown").await;
    let queues = RemoteQueues::with_intervals(url, FAST, FAST);
    assert!(matches!(
        queues.find_by_id("never-observed").await,
        Err(streamlab_jobs::JobError::NotFound(_))
    ));
}
