//! Streamlab coordinator.
//!
//! Owns the authoritative queue set, assigns job identity, runs the
//! coordinator-local worker pool, and exposes the `/job-manager` HTTP
//! surface that remote workers poll and the dashboard queries.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod router;
pub mod routes;
pub mod state;

pub use config::ServerConfig;
pub use coordinator::{Coordinator, JobDetails};
pub use error::{ApiError, ApiResult};
pub use router::build_app_router;
pub use state::AppState;
