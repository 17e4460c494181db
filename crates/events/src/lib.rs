//! Streamlab state-broadcast infrastructure.
//!
//! The experiment dashboard subscribes to live state through a single
//! in-process pub/sub hub:
//!
//! - [`StateBus`] -- publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`StateUpdate`] -- the keyed state envelope pushed to subscribers.
//!
//! The job framework publishes a snapshot of its queues under
//! [`JOB_MANAGER_STATE_KEY`] after every queue mutation; the WebSocket
//! layer that fans updates out to browsers lives outside this workspace
//! and only needs a [`StateBus::subscribe`] handle.

pub mod bus;

pub use bus::{StateBus, StateUpdate};

/// State key under which the job framework publishes queue snapshots.
pub const JOB_MANAGER_STATE_KEY: &str = "job_manager_state";
