use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use streamlab_api::{build_app_router, AppState, Coordinator, ServerConfig};
use streamlab_events::StateBus;
use streamlab_jobs::{CallbackRegistry, JobStore, WorkerPool};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "streamlab=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- State bus ---
    let bus = Arc::new(StateBus::default());
    tracing::info!("State bus created");

    // --- Queue store + coordinator ---
    let store = Arc::new(JobStore::new(Arc::clone(&bus)));
    let coordinator = Arc::new(
        Coordinator::new(Arc::clone(&store), config.jobs_dir.clone())
            .await
            .expect("Failed to prepare jobs directory"),
    );
    tracing::info!(jobs_dir = %config.jobs_dir.display(), "Coordinator started");

    // --- Callback registry ---
    // Experiment callbacks register here at startup; shell and docker
    // jobs need no registration.
    let registry = Arc::new(CallbackRegistry::new());

    // --- Local worker pool ---
    let workers = WorkerPool::start(
        config.local_workers,
        Arc::clone(&store),
        Arc::clone(&registry),
        config.jobs_dir.clone(),
    );
    tracing::info!(count = workers.len(), "Local worker pool started");

    // --- HTTP server ---
    let state = AppState {
        store,
        coordinator,
        bus,
    };
    let app = build_app_router(state, &config);

    let addr = SocketAddr::new(config.host.parse().expect("Invalid HOST"), config.port);
    tracing::info!("Starting coordinator on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    axum::serve(listener, app)
        .await
        .expect("Server terminated unexpectedly");
}
