use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use streamlab_jobs::{CallbackRegistry, WorkerPool};
use streamlab_worker::{RemoteQueues, WorkerConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "streamlab=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WorkerConfig::from_env();
    tracing::info!(
        coordinator = %config.coordinator_url,
        slots = config.slots,
        "Worker process starting",
    );

    // Experiment callbacks register here at startup; shell and docker
    // jobs need no registration.
    let registry = Arc::new(CallbackRegistry::new());
    tracing::info!(callbacks = ?registry.names(), "Callback registry ready");

    let queues = Arc::new(RemoteQueues::new(config.coordinator_url.clone()));

    let handles = WorkerPool::start(config.slots, queues, registry, config.jobs_dir.clone());
    for handle in handles {
        // Worker loops only return on framework failure; propagate that
        // loudly by exiting the process.
        let _ = handle.await;
    }
    tracing::error!("All worker slots terminated; exiting");
    std::process::exit(1);
}
