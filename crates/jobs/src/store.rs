//! Coordinator-local queue store.
//!
//! One arena of records keyed by job id, plus five per-status FIFO
//! indices updated together under a single lock. A record carries its
//! current queue with it, so the "a job occupies at most one queue"
//! invariant is structural: moving a job is remove-from-old, append-to-new
//! in one critical section, never a scan of every queue.
//!
//! Every mutation publishes a [`QueueSnapshot`] on the [`StateBus`] so
//! the dashboard sees queue state change in real time.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify};

use streamlab_events::{StateBus, StateUpdate, JOB_MANAGER_STATE_KEY};

use crate::error::JobError;
use crate::queues::JobQueues;
use crate::record::{JobDescriptor, JobRecord, JobStatus};

// ---------------------------------------------------------------------------
// QueueSnapshot
// ---------------------------------------------------------------------------

/// Read-only view of every queue, published after each mutation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub scheduled: Vec<JobDescriptor>,
    pub running: Vec<JobDescriptor>,
    pub successful: Vec<JobDescriptor>,
    pub cancelled: Vec<JobDescriptor>,
    pub failed: Vec<JobDescriptor>,
}

impl QueueSnapshot {
    fn lane_mut(&mut self, status: JobStatus) -> &mut Vec<JobDescriptor> {
        match status {
            JobStatus::Scheduled => &mut self.scheduled,
            JobStatus::Running => &mut self.running,
            JobStatus::Successful => &mut self.successful,
            JobStatus::Cancelled => &mut self.cancelled,
            JobStatus::Failed => &mut self.failed,
        }
    }
}

// ---------------------------------------------------------------------------
// JobStore
// ---------------------------------------------------------------------------

/// A record slot in the arena: the record plus its current residency.
struct Slot {
    record: JobRecord,
    queue: Option<JobStatus>,
}

struct StoreInner {
    slots: HashMap<String, Slot>,
    queues: HashMap<JobStatus, VecDeque<String>>,
}

impl StoreInner {
    fn new() -> Self {
        Self {
            slots: HashMap::new(),
            queues: JobStatus::ALL
                .into_iter()
                .map(|status| (status, VecDeque::new()))
                .collect(),
        }
    }

    /// Merge the record into the arena, creating the slot on first sight.
    fn upsert(&mut self, record: &JobRecord) {
        match self.slots.get_mut(&record.job_id) {
            Some(slot) => slot.record.merge_from(record),
            None => {
                self.slots.insert(
                    record.job_id.clone(),
                    Slot {
                        record: record.clone(),
                        queue: None,
                    },
                );
            }
        }
    }

    /// Move a job to `target`: purge its previous residency (if any) and
    /// append to the target queue. Both index updates happen under the
    /// caller's lock, so single-queue residency holds after every call.
    fn move_to(&mut self, job_id: &str, target: JobStatus) {
        let Some(slot) = self.slots.get_mut(job_id) else {
            return;
        };
        if let Some(previous) = slot.queue.take() {
            if let Some(queue) = self.queues.get_mut(&previous) {
                queue.retain(|id| id != job_id);
            }
        }
        if let Some(queue) = self.queues.get_mut(&target) {
            queue.push_back(job_id.to_string());
        }
        slot.queue = Some(target);
    }

    fn snapshot(&self) -> QueueSnapshot {
        let mut snapshot = QueueSnapshot::default();
        for status in JobStatus::ALL {
            let lane = snapshot.lane_mut(status);
            if let Some(queue) = self.queues.get(&status) {
                lane.extend(
                    queue
                        .iter()
                        .filter_map(|id| self.slots.get(id))
                        .map(|slot| slot.record.descriptor()),
                );
            }
        }
        snapshot
    }
}

/// Thread-safe multi-queue store; the authoritative queue set owned by
/// the coordinator.
pub struct JobStore {
    inner: Mutex<StoreInner>,
    wakeups: HashMap<JobStatus, Notify>,
    bus: Arc<StateBus>,
}

impl JobStore {
    pub fn new(bus: Arc<StateBus>) -> Self {
        Self {
            inner: Mutex::new(StoreInner::new()),
            wakeups: JobStatus::ALL
                .into_iter()
                .map(|status| (status, Notify::new()))
                .collect(),
            bus,
        }
    }

    fn wakeup(&self, queue: JobStatus) -> &Notify {
        // The map is built over JobStatus::ALL in new(), so the entry
        // always exists.
        &self.wakeups[&queue]
    }

    /// Move `record` into `queue`, merging its fields into the arena.
    pub async fn put(&self, queue: JobStatus, record: &JobRecord) {
        let snapshot = {
            let mut inner = self.inner.lock().await;
            inner.upsert(record);
            inner.move_to(&record.job_id, queue);
            inner.snapshot()
        };
        self.wakeup(queue).notify_one();
        self.publish(snapshot);
    }

    /// Blocking dequeue with an optional timeout. `None` means the
    /// timeout elapsed with no job available.
    pub async fn get(&self, queue: JobStatus, timeout: Option<Duration>) -> Option<JobRecord> {
        let deadline = timeout.map(|t| tokio::time::Instant::now() + t);
        loop {
            // Register for a wakeup before checking, so a put landing
            // between the check and the await is not lost.
            let notified = self.wakeup(queue).notified();
            if let Some(record) = self.try_pop(queue).await {
                return Some(record);
            }
            match deadline {
                Some(deadline) => {
                    if tokio::time::Instant::now() >= deadline {
                        return self.try_pop(queue).await;
                    }
                    if tokio::time::timeout_at(deadline, notified).await.is_err() {
                        return self.try_pop(queue).await;
                    }
                }
                None => notified.await,
            }
        }
    }

    /// Non-blocking pop from the front of `queue`.
    async fn try_pop(&self, queue: JobStatus) -> Option<JobRecord> {
        let (record, snapshot) = {
            let mut inner = self.inner.lock().await;
            let job_id = inner.queues.get_mut(&queue)?.pop_front()?;
            let slot = inner.slots.get_mut(&job_id)?;
            slot.queue = None;
            let record = slot.record.clone();
            (record, inner.snapshot())
        };
        self.publish(snapshot);
        Some(record)
    }

    /// Merge an incoming update into the cached record without touching
    /// queue membership. Serves `PUT /job-manager/update`.
    pub async fn update(&self, record: &JobRecord) -> Result<JobRecord, JobError> {
        let (merged, snapshot) = {
            let mut inner = self.inner.lock().await;
            let slot = inner
                .slots
                .get_mut(&record.job_id)
                .ok_or_else(|| JobError::NotFound(record.job_id.clone()))?;
            slot.record.merge_from(record);
            let merged = slot.record.clone();
            (merged, inner.snapshot())
        };
        self.publish(snapshot);
        Ok(merged)
    }

    /// Arena lookup by id, regardless of queue membership.
    pub async fn find_by_id(&self, job_id: &str) -> Result<JobRecord, JobError> {
        let inner = self.inner.lock().await;
        inner
            .slots
            .get(job_id)
            .map(|slot| slot.record.clone())
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))
    }

    /// Drain the three terminal queues and return their records, leaving
    /// `scheduled` and `running` untouched. Drained records stay in the
    /// arena and remain addressable by id.
    pub async fn clear_jobs(&self) -> Vec<JobRecord> {
        let (cleared, snapshot) = {
            let mut inner = self.inner.lock().await;
            let mut cleared = Vec::new();
            for status in JobStatus::TERMINAL {
                let ids: Vec<String> = inner
                    .queues
                    .get_mut(&status)
                    .map(|queue| queue.drain(..).collect())
                    .unwrap_or_default();
                for id in ids {
                    if let Some(slot) = inner.slots.get_mut(&id) {
                        slot.queue = None;
                        cleared.push(slot.record.clone());
                    }
                }
            }
            (cleared, inner.snapshot())
        };
        self.publish(snapshot);
        cleared
    }

    fn publish(&self, snapshot: QueueSnapshot) {
        match serde_json::to_value(&snapshot) {
            Ok(payload) => self
                .bus
                .publish(StateUpdate::new(JOB_MANAGER_STATE_KEY, payload)),
            Err(e) => tracing::error!(error = %e, "Failed to serialize queue snapshot"),
        }
    }
}

#[async_trait]
impl JobQueues for JobStore {
    async fn get(
        &self,
        queue: JobStatus,
        timeout: Option<Duration>,
    ) -> Result<Option<JobRecord>, JobError> {
        Ok(JobStore::get(self, queue, timeout).await)
    }

    async fn put(&self, queue: JobStatus, record: &JobRecord) -> Result<(), JobError> {
        JobStore::put(self, queue, record).await;
        Ok(())
    }

    async fn sync_job(&self, record: &JobRecord) -> Result<(), JobError> {
        JobStore::update(self, record).await.map(|_| ())
    }

    async fn find_by_id(&self, job_id: &str) -> Result<JobRecord, JobError> {
        JobStore::find_by_id(self, job_id).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{JobConfig, ShellConfig};
    use assert_matches::assert_matches;

    fn store() -> JobStore {
        JobStore::new(Arc::new(StateBus::default()))
    }

    fn record(id: &str) -> JobRecord {
        JobRecord::new(id, JobConfig::Shell(ShellConfig { cmd: "true".into() }))
    }

    /// Count how many queue indices hold `job_id`.
    async fn residency(store: &JobStore, job_id: &str) -> usize {
        let inner = store.inner.lock().await;
        inner
            .queues
            .values()
            .flat_map(|queue| queue.iter())
            .filter(|id| id.as_str() == job_id)
            .count()
    }

    #[tokio::test]
    async fn put_then_get_preserves_fifo_order() {
        let store = store();
        store.put(JobStatus::Scheduled, &record("a")).await;
        store.put(JobStatus::Scheduled, &record("b")).await;
        store.put(JobStatus::Scheduled, &record("c")).await;

        for expected in ["a", "b", "c"] {
            let popped = store.get(JobStatus::Scheduled, None).await.expect("job");
            assert_eq!(popped.job_id, expected);
        }
    }

    #[tokio::test]
    async fn get_times_out_with_none() {
        let store = store();
        let got = store
            .get(JobStatus::Scheduled, Some(Duration::from_millis(20)))
            .await;
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn get_wakes_up_on_put() {
        let store = Arc::new(store());
        let waiter = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.get(JobStatus::Scheduled, None).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        store.put(JobStatus::Scheduled, &record("x")).await;

        let got = waiter.await.expect("join").expect("job");
        assert_eq!(got.job_id, "x");
    }

    #[tokio::test]
    async fn put_moves_job_between_queues() {
        // Scenario: put("scheduled", x) then put("failed", x) -- x must be
        // absent from scheduled and present only in failed.
        let store = store();
        let job = record("x");
        store.put(JobStatus::Scheduled, &job).await;
        store.put(JobStatus::Failed, &job).await;

        assert_eq!(residency(&store, "x").await, 1);
        let inner = store.inner.lock().await;
        assert!(inner.queues[&JobStatus::Scheduled].is_empty());
        assert_eq!(inner.queues[&JobStatus::Failed].front().map(String::as_str), Some("x"));
    }

    #[tokio::test]
    async fn single_queue_residency_under_arbitrary_puts() {
        let store = store();
        let job = record("j");
        for status in [
            JobStatus::Scheduled,
            JobStatus::Running,
            JobStatus::Scheduled,
            JobStatus::Running,
            JobStatus::Successful,
        ] {
            store.put(status, &job).await;
            assert_eq!(residency(&store, "j").await, 1);
        }
    }

    #[tokio::test]
    async fn find_by_id_outlives_queue_membership() {
        let store = store();
        store.put(JobStatus::Scheduled, &record("x")).await;
        let _ = store.get(JobStatus::Scheduled, None).await;

        // Popped from every queue, but still addressable.
        let found = store.find_by_id("x").await.expect("cached");
        assert_eq!(found.job_id, "x");

        assert_matches!(
            store.find_by_id("never-seen").await,
            Err(JobError::NotFound(_))
        );
    }

    #[tokio::test]
    async fn update_merges_without_moving() {
        let store = store();
        let job = record("x");
        store.put(JobStatus::Running, &job).await;

        let mut progress = job.clone();
        progress.mark_running();
        progress.progress = Some(0.5);
        store.update(&progress).await.expect("update");

        let inner = store.inner.lock().await;
        assert_eq!(inner.queues[&JobStatus::Running].len(), 1);
        drop(inner);

        let found = store.find_by_id("x").await.expect("cached");
        assert_eq!(found.progress, Some(0.5));
    }

    #[tokio::test]
    async fn update_unknown_id_is_hard_error() {
        let store = store();
        assert_matches!(
            store.update(&record("ghost")).await,
            Err(JobError::NotFound(_))
        );
    }

    #[tokio::test]
    async fn clear_jobs_drains_only_terminal_queues() {
        let store = store();
        let mut done = record("done");
        done.mark_successful(None);
        let mut dead = record("dead");
        dead.mark_failed("boom".into());

        store.put(JobStatus::Scheduled, &record("live")).await;
        store.put(JobStatus::Successful, &done).await;
        store.put(JobStatus::Failed, &dead).await;

        let cleared = store.clear_jobs().await;
        let mut ids: Vec<_> = cleared.iter().map(|r| r.job_id.as_str()).collect();
        ids.sort_unstable();
        assert_eq!(ids, ["dead", "done"]);

        let inner = store.inner.lock().await;
        assert_eq!(inner.queues[&JobStatus::Scheduled].len(), 1);
        assert!(inner.queues[&JobStatus::Successful].is_empty());
        assert!(inner.queues[&JobStatus::Failed].is_empty());
    }

    #[tokio::test]
    async fn mutations_publish_snapshots() {
        let bus = Arc::new(StateBus::default());
        let mut rx = bus.subscribe();
        let store = JobStore::new(Arc::clone(&bus));

        store.put(JobStatus::Scheduled, &record("x")).await;

        let update = rx.recv().await.expect("snapshot");
        assert_eq!(update.key, JOB_MANAGER_STATE_KEY);
        let scheduled = update.payload["scheduled"]
            .as_array()
            .expect("scheduled lane");
        assert_eq!(scheduled.len(), 1);
        assert_eq!(scheduled[0]["job_id"], "x");
    }

    #[tokio::test]
    async fn terminal_put_fires_shared_latch() {
        let store = store();
        let handle = record("x");
        store.put(JobStatus::Scheduled, &handle).await;

        let mut worker_copy = store.get(JobStatus::Scheduled, None).await.expect("job");
        worker_copy.mark_running();
        store.put(JobStatus::Running, &worker_copy).await;
        assert!(!handle.is_done());

        worker_copy.mark_successful(Some("out".into()));
        store.put(JobStatus::Successful, &worker_copy).await;
        assert!(handle.is_done());
    }
}
