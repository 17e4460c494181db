use std::sync::Arc;

use streamlab_events::StateBus;
use streamlab_jobs::JobStore;

use crate::coordinator::Coordinator;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// The authoritative queue set.
    pub store: Arc<JobStore>,
    /// Scheduling authority and job-detail reader.
    pub coordinator: Arc<Coordinator>,
    /// State-broadcast bus the dashboard layer subscribes to.
    pub bus: Arc<StateBus>,
}
