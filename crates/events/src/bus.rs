//! In-process state bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`StateBus`] is the seam between the job framework and the dashboard:
//! every component that owns live state publishes keyed [`StateUpdate`]s,
//! and any number of subscribers (WebSocket fan-out, tests, loggers)
//! receive them independently. It is designed to be shared via
//! `Arc<StateBus>` across the application.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// StateUpdate
// ---------------------------------------------------------------------------

/// A keyed state snapshot published on the bus.
///
/// The `key` names the state slice being replaced (e.g.
/// `"job_manager_state"`); the `payload` is the full serialized snapshot
/// for that slice, not a delta.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateUpdate {
    /// Name of the state slice, e.g. `"job_manager_state"`.
    pub key: String,

    /// Serialized snapshot of the slice.
    pub payload: serde_json::Value,

    /// When the snapshot was taken (UTC).
    pub timestamp: DateTime<Utc>,
}

impl StateUpdate {
    /// Create an update for `key` carrying `payload`, stamped now.
    pub fn new(key: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            key: key.into(),
            payload,
            timestamp: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// StateBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out state bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published [`StateUpdate`].
///
/// # Usage
///
/// ```rust
/// use streamlab_events::bus::{StateBus, StateUpdate};
///
/// let bus = StateBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(StateUpdate::new("run_states", serde_json::json!({})));
/// ```
pub struct StateBus {
    sender: broadcast::Sender<StateUpdate>,
}

impl StateBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed updates are dropped
    /// and slow receivers will observe a `RecvError::Lagged`. Snapshots
    /// are full replacements, so a lagged receiver only needs the latest.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an update to all current subscribers.
    ///
    /// If there are no active subscribers the update is silently dropped.
    pub fn publish(&self, update: StateUpdate) {
        // Ignore the SendError -- it only means there are zero receivers.
        let _ = self.sender.send(update);
    }

    /// Subscribe to all updates published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<StateUpdate> {
        self.sender.subscribe()
    }
}

impl Default for StateBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
