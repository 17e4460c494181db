//! Scheduling authority.
//!
//! The coordinator is the only component that assigns job identity.
//! Ids are microsecond timestamps bumped past the previous assignment,
//! zero-padded to a fixed width so queue snapshots sort by schedule
//! time lexicographically.

use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use streamlab_jobs::{JobConfig, JobError, JobRecord, JobStatus, JobStore, STDOUTERR_LOG};

/// Zero-padded width of assigned job ids.
const JOB_ID_WIDTH: usize = 16;

pub struct Coordinator {
    store: Arc<JobStore>,
    jobs_dir: PathBuf,
    last_id: AtomicI64,
}

impl Coordinator {
    /// Create the coordinator and reset the jobs directory.
    ///
    /// Queue state does not survive restarts, so logs from a previous
    /// run would never be addressable again -- wipe them.
    pub async fn new(store: Arc<JobStore>, jobs_dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let jobs_dir = jobs_dir.into();
        tokio::fs::remove_dir_all(&jobs_dir).await.ok();
        tokio::fs::create_dir_all(&jobs_dir).await?;
        Ok(Self {
            store,
            jobs_dir,
            last_id: AtomicI64::new(0),
        })
    }

    pub fn jobs_dir(&self) -> &PathBuf {
        &self.jobs_dir
    }

    /// Assign the next job id: the current microsecond timestamp, or
    /// one past the previous id if the clock has not advanced.
    fn next_job_id(&self) -> String {
        let now = Utc::now().timestamp_micros();
        let previous = self
            .last_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(last.max(now - 1) + 1)
            })
            .unwrap_or(now - 1);
        let assigned = previous.max(now - 1) + 1;
        format!("{assigned:0width$}", width = JOB_ID_WIDTH)
    }

    /// Give `config` identity and `Scheduled` status and enqueue it.
    ///
    /// The returned record shares its completion latch with the queued
    /// copy, so callers can [`JobRecord::wait_done`] on it directly.
    pub async fn schedule(&self, config: JobConfig) -> JobRecord {
        let mut record = JobRecord::new(self.next_job_id(), config);
        record.scheduled_at = Some(Utc::now());
        tracing::info!(
            job_id = %record.job_id,
            job = %record.job_name(),
            "Job scheduled",
        );
        self.store.put(JobStatus::Scheduled, &record).await;
        record
    }

    /// Schedule `config`, wait for its terminal state, and return its
    /// output. A failed or cancelled job surfaces as
    /// [`JobError::Unsuccessful`] carrying the recorded error.
    pub async fn schedule_and_wait(&self, config: JobConfig) -> Result<Option<String>, JobError> {
        let handle = self.schedule(config).await;
        handle.wait_done().await;
        let record = self.store.find_by_id(&handle.job_id).await?;
        match record.status {
            JobStatus::Successful => Ok(record.output),
            status => Err(JobError::Unsuccessful {
                job_id: record.job_id,
                status,
                error: record.error.unwrap_or_else(|| "unknown".into()),
            }),
        }
    }

    /// Full record plus captured console log for inspection.
    pub async fn job_details(&self, job_id: &str) -> Result<JobDetails, JobError> {
        let record = self.store.find_by_id(job_id).await?;
        let log = tokio::fs::read_to_string(self.jobs_dir.join(job_id).join(STDOUTERR_LOG))
            .await
            .ok();
        Ok(JobDetails {
            job_name: record.job_name(),
            record,
            log,
        })
    }
}

/// Payload of `GET /job-manager/job/details`.
#[derive(Debug, Serialize)]
pub struct JobDetails {
    #[serde(flatten)]
    pub record: JobRecord,
    pub job_name: String,
    /// Captured, stream-tagged console log, when the job ran on this
    /// host and has produced output.
    pub log: Option<String>,
}
