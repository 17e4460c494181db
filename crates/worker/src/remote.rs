//! HTTP-polling implementation of the queue contract.
//!
//! [`RemoteQueues`] lets a worker process on another machine run the
//! same execution loop as a coordinator-local worker: `get` long-polls
//! the coordinator and retries forever, `put` records transitions and
//! treats transport failure as fatal, and `sync_job` pushes throttled
//! progress updates.
//!
//! Incoming records are merged into a local cache by id rather than
//! replacing cached entries, so completion latches held by earlier
//! clones keep working across deserialization.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use streamlab_jobs::{JobError, JobQueues, JobRecord, JobStatus};

/// Minimum delay between queue-poll attempts, so a coordinator outage
/// or an empty queue does not turn into a hot loop.
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Throttle window for progress syncs, per job.
const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(2);

pub struct RemoteQueues {
    base_url: String,
    client: reqwest::Client,
    cache: Mutex<HashMap<String, JobRecord>>,
    last_synced: Mutex<HashMap<String, Instant>>,
    retry_delay: Duration,
    sync_interval: Duration,
}

impl RemoteQueues {
    /// Client for the coordinator at `base_url` (e.g.
    /// `http://lab-host:8100`), with production pacing.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_intervals(base_url, DEFAULT_RETRY_DELAY, DEFAULT_SYNC_INTERVAL)
    }

    /// Client with explicit pacing. Tests shrink both intervals.
    pub fn with_intervals(
        base_url: impl Into<String>,
        retry_delay: Duration,
        sync_interval: Duration,
    ) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            client: reqwest::Client::new(),
            cache: Mutex::new(HashMap::new()),
            last_synced: Mutex::new(HashMap::new()),
            retry_delay,
            sync_interval,
        }
    }

    fn queue_url(&self, queue: JobStatus) -> String {
        format!("{}/job-manager/queue/{queue}", self.base_url)
    }

    /// Merge an incoming record into the cache by id and return the
    /// cached version. Cache misses insert the record as-is.
    async fn absorb(&self, record: JobRecord) -> JobRecord {
        let mut cache = self.cache.lock().await;
        match cache.get_mut(&record.job_id) {
            Some(cached) => {
                cached.merge_from(&record);
                cached.clone()
            }
            None => {
                cache.insert(record.job_id.clone(), record.clone());
                record
            }
        }
    }
}

fn transport(err: reqwest::Error) -> JobError {
    JobError::Transport(err.to_string())
}

#[async_trait]
impl JobQueues for RemoteQueues {
    /// Long-poll the coordinator until a job arrives.
    ///
    /// 204 means the queue stayed empty for the server-side window --
    /// retry. Transport and HTTP errors are likewise swallowed and
    /// retried indefinitely (workers run forever by design); each
    /// failed attempt leaves a debug log as the only signal. `timeout`
    /// is forwarded as the server-side window, not a client deadline.
    async fn get(
        &self,
        queue: JobStatus,
        timeout: Option<Duration>,
    ) -> Result<Option<JobRecord>, JobError> {
        let url = self.queue_url(queue);
        let mut last_attempt: Option<Instant> = None;
        loop {
            if let Some(at) = last_attempt {
                let elapsed = at.elapsed();
                if elapsed < self.retry_delay {
                    tokio::time::sleep(self.retry_delay - elapsed).await;
                }
            }
            last_attempt = Some(Instant::now());

            let mut request = self.client.get(&url);
            if let Some(window) = timeout {
                request = request.query(&[("timeout", window.as_secs_f64())]);
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    tracing::debug!(queue = %queue, error = %e, "Queue poll failed, retrying");
                    continue;
                }
            };
            if response.status() == reqwest::StatusCode::NO_CONTENT {
                continue;
            }
            let response = match response.error_for_status() {
                Ok(response) => response,
                Err(e) => {
                    tracing::debug!(queue = %queue, error = %e, "Queue poll rejected, retrying");
                    continue;
                }
            };
            match response.json::<JobRecord>().await {
                Ok(record) => return Ok(Some(self.absorb(record).await)),
                Err(e) => {
                    tracing::debug!(queue = %queue, error = %e, "Bad queue payload, retrying");
                    continue;
                }
            }
        }
    }

    /// Record a transition. A non-2xx response or transport failure is
    /// fatal to the calling worker -- the transition was not recorded.
    async fn put(&self, queue: JobStatus, record: &JobRecord) -> Result<(), JobError> {
        self.client
            .put(self.queue_url(queue))
            .json(record)
            .send()
            .await
            .map_err(transport)?
            .error_for_status()
            .map_err(transport)?;

        // Merge back locally so latch-holding clones of this record
        // observe the transition too.
        self.absorb(record.clone()).await;
        Ok(())
    }

    /// Throttled progress push. At most one update per job per
    /// interval; calls inside the window are coalesced into silence.
    async fn sync_job(&self, record: &JobRecord) -> Result<(), JobError> {
        {
            let mut last_synced = self.last_synced.lock().await;
            if let Some(at) = last_synced.get(&record.job_id) {
                if at.elapsed() < self.sync_interval {
                    return Ok(());
                }
            }
            last_synced.insert(record.job_id.clone(), Instant::now());
        }

        self.client
            .put(format!("{}/job-manager/update", self.base_url))
            .json(record)
            .send()
            .await
            .map_err(transport)?
            .error_for_status()
            .map_err(transport)?;
        Ok(())
    }

    /// Cache lookup. Only records this client has already observed are
    /// addressable; asking about anything else is a caller bug.
    async fn find_by_id(&self, job_id: &str) -> Result<JobRecord, JobError> {
        self.cache
            .lock()
            .await
            .get(job_id)
            .cloned()
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))
    }
}
