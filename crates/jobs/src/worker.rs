//! Worker execution loop.
//!
//! A worker is one concurrency slot: an unbounded loop that pulls the
//! next scheduled job, runs it through its executor with a private
//! output sink, and deposits it in a terminal queue. Workers are
//! generic over [`JobQueues`], so the same loop runs on
//! coordinator-local tasks and on remote worker processes.
//!
//! Payload failures are contained to the job's record; failures to
//! record a transition (queue put, transport) terminate the worker
//! loudly rather than limping on with corrupted state.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::capture::{JobSink, STDOUTERR_LOG};
use crate::error::{format_error_chain, JobError};
use crate::exec;
use crate::queues::JobQueues;
use crate::record::{JobRecord, JobStatus};
use crate::registry::CallbackRegistry;

/// One worker slot.
pub struct Worker<Q: JobQueues> {
    worker_id: String,
    queues: Arc<Q>,
    registry: Arc<CallbackRegistry>,
    jobs_dir: PathBuf,
}

impl<Q: JobQueues> Worker<Q> {
    pub fn new(
        worker_id: impl Into<String>,
        queues: Arc<Q>,
        registry: Arc<CallbackRegistry>,
        jobs_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            worker_id: worker_id.into(),
            queues,
            registry,
            jobs_dir: jobs_dir.into(),
        }
    }

    /// Run until a framework failure. Under normal operation this never
    /// returns.
    pub async fn run(self) {
        tracing::info!(worker_id = %self.worker_id, "Worker started");
        loop {
            let record = match self.queues.get(JobStatus::Scheduled, None).await {
                Ok(Some(record)) => record,
                Ok(None) => continue,
                Err(e) => {
                    tracing::error!(
                        worker_id = %self.worker_id,
                        error = %e,
                        "Worker terminating: scheduled-queue pop failed",
                    );
                    return;
                }
            };

            if let Err(e) = self.process(record).await {
                tracing::error!(
                    worker_id = %self.worker_id,
                    error = %e,
                    "Worker terminating: failed to record a job transition",
                );
                return;
            }
        }
    }

    /// Run one dequeued record to a terminal state.
    ///
    /// Errors returned here are framework failures (sink creation,
    /// transition puts); payload failures land in the record instead.
    async fn process(&self, mut record: JobRecord) -> Result<(), JobError> {
        let job_dir = self.jobs_dir.join(&record.job_id);
        tokio::fs::create_dir_all(&job_dir).await?;

        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        let sink = Arc::new(
            JobSink::create(
                job_dir.join(STDOUTERR_LOG),
                record.job_name(),
                Some(progress_tx),
            )
            .await?,
        );

        record.mark_running();
        self.queues.put(JobStatus::Running, &record).await?;
        tracing::info!(
            worker_id = %self.worker_id,
            job_id = %record.job_id,
            job = %record.job_name(),
            "Job started",
        );

        let syncer = tokio::spawn(forward_progress(
            Arc::clone(&self.queues),
            record.clone(),
            progress_rx,
        ));

        let result = exec::execute(&record, &sink, &self.registry).await;

        if let Err(e) = sink.flush().await {
            tracing::warn!(job_id = %record.job_id, error = %e, "Failed to flush job log");
        }
        // Dropping the sink closes the progress channel, ending the
        // sync task; the executor already joined its stream readers.
        drop(sink);

        match result {
            Ok(output) => {
                record.mark_successful(output);
                self.queues.put(JobStatus::Successful, &record).await?;
                tracing::info!(
                    worker_id = %self.worker_id,
                    job_id = %record.job_id,
                    "Job finished",
                );
            }
            Err(e) => {
                let trace = format_error_chain(&e);
                record.mark_failed(trace);
                self.queues.put(JobStatus::Failed, &record).await?;
                tracing::warn!(
                    worker_id = %self.worker_id,
                    job_id = %record.job_id,
                    error = %e,
                    "Job failed",
                );
            }
        }

        let _ = syncer.await;
        Ok(())
    }
}

/// Push progress fractions through the throttled sync channel until the
/// job's sink is dropped.
async fn forward_progress<Q: JobQueues>(
    queues: Arc<Q>,
    mut record: JobRecord,
    mut progress_rx: mpsc::UnboundedReceiver<f64>,
) {
    while let Some(fraction) = progress_rx.recv().await {
        record.progress = Some(fraction);
        if let Err(e) = queues.sync_job(&record).await {
            tracing::warn!(job_id = %record.job_id, error = %e, "Failed to sync job progress");
        }
    }
}

/// Fixed-size set of worker slots.
pub struct WorkerPool;

impl WorkerPool {
    /// Spawn `count` workers over `queues`, returning their task
    /// handles. Worker ids are `worker-000`, `worker-001`, ...
    pub fn start<Q: JobQueues>(
        count: usize,
        queues: Arc<Q>,
        registry: Arc<CallbackRegistry>,
        jobs_dir: impl Into<PathBuf>,
    ) -> Vec<JoinHandle<()>> {
        let jobs_dir = jobs_dir.into();
        (0..count)
            .map(|i| {
                let worker = Worker::new(
                    format!("worker-{i:03}"),
                    Arc::clone(&queues),
                    Arc::clone(&registry),
                    jobs_dir.clone(),
                );
                tokio::spawn(worker.run())
            })
            .collect()
    }
}
