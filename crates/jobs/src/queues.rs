//! The queue contract shared by the coordinator-local store and the
//! HTTP-polling remote client.
//!
//! Workers are generic over this trait, so the same execution loop runs
//! on coordinator-local tasks (backed by [`JobStore`](crate::store::JobStore))
//! and on standalone worker processes (backed by the remote client in
//! `streamlab-worker`).

use std::time::Duration;

use async_trait::async_trait;

use crate::error::JobError;
use crate::record::{JobRecord, JobStatus};

/// Abstract queue operations over the five lifecycle queues.
#[async_trait]
pub trait JobQueues: Send + Sync + 'static {
    /// Blocking dequeue. `None` timeout suspends until a job arrives;
    /// `Ok(None)` means the timeout elapsed with the queue still empty --
    /// never an error.
    async fn get(
        &self,
        queue: JobStatus,
        timeout: Option<Duration>,
    ) -> Result<Option<JobRecord>, JobError>;

    /// Move a record into the named queue. A job occupies at most one
    /// queue at a time; any previous residency is purged first.
    async fn put(&self, queue: JobStatus, record: &JobRecord) -> Result<(), JobError>;

    /// Push an incremental update (typically progress) without changing
    /// queue membership. The only operation callers may invoke at high
    /// frequency; implementations may throttle.
    async fn sync_job(&self, record: &JobRecord) -> Result<(), JobError>;

    /// Look up a record by id regardless of queue membership. Unknown
    /// ids are a hard error.
    async fn find_by_id(&self, job_id: &str) -> Result<JobRecord, JobError>;
}
