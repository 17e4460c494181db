//! Job records and their lifecycle.
//!
//! A [`JobRecord`] describes one schedulable unit of work: what to run
//! (the flattened kind tag + config), where it is in its lifecycle
//! ([`JobStatus`]), and what came out of it (output, error, progress).
//! Records travel between the coordinator and workers as flat JSON; the
//! completion latch is process-local and never crosses the wire -- the
//! `done` marker stands in for it when serialized.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::JobError;

// ---------------------------------------------------------------------------
// JobStatus
// ---------------------------------------------------------------------------

/// Lifecycle state of a job. Queue names are derived from these.
///
/// Transitions form the path `Scheduled -> Running -> {Successful |
/// Failed}`, with `Cancelled` reachable only before a job leaves the
/// scheduled queue. Terminal states are never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Scheduled,
    Running,
    Successful,
    Cancelled,
    Failed,
}

impl JobStatus {
    /// Every status, in queue-snapshot order.
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Scheduled,
        JobStatus::Running,
        JobStatus::Successful,
        JobStatus::Cancelled,
        JobStatus::Failed,
    ];

    /// The three states a record never leaves.
    pub const TERMINAL: [JobStatus; 3] =
        [JobStatus::Successful, JobStatus::Cancelled, JobStatus::Failed];

    /// Queue name for this status (also the wire spelling).
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Scheduled => "scheduled",
            JobStatus::Running => "running",
            JobStatus::Successful => "successful",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Failed => "failed",
        }
    }

    /// Whether this status ends the lifecycle.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Successful | JobStatus::Cancelled | JobStatus::Failed
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(JobStatus::Scheduled),
            "running" => Ok(JobStatus::Running),
            "successful" => Ok(JobStatus::Successful),
            "cancelled" => Ok(JobStatus::Cancelled),
            "failed" => Ok(JobStatus::Failed),
            other => Err(JobError::UnknownQueue(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Job configs (one per executor kind)
// ---------------------------------------------------------------------------

/// Kind tag plus kind-specific payload, flattened into the record on the
/// wire as `"type"` + `"config"`.
///
/// Remote workers only ever see this serialized form, so every config
/// must be self-contained -- no process-local handles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "config", rename_all = "lowercase")]
pub enum JobConfig {
    /// A registered in-process callback, addressed by name.
    Callback(CallbackConfig),
    /// A shell command line.
    Shell(ShellConfig),
    /// A containerized invocation.
    Docker(DockerConfig),
}

impl JobConfig {
    /// The wire kind tag.
    pub fn kind(&self) -> &'static str {
        match self {
            JobConfig::Callback(_) => "callback",
            JobConfig::Shell(_) => "shell",
            JobConfig::Docker(_) => "docker",
        }
    }
}

/// Config for a callback job: registry name plus positional and keyword
/// arguments, all JSON so the record survives the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackConfig {
    pub name: String,
    #[serde(default)]
    pub args: Vec<serde_json::Value>,
    #[serde(default)]
    pub kwargs: serde_json::Map<String, serde_json::Value>,
}

/// Config for a shell job: a single command line run under `bash -c`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellConfig {
    pub cmd: String,
}

/// Config for a container job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockerConfig {
    pub image: String,
    #[serde(default)]
    pub mounts: Vec<BindMount>,
    #[serde(default)]
    pub args: Vec<String>,
}

/// A bind mount: either one path used on both sides, or a
/// `[host, container]` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BindMount {
    Path(String),
    Pair(String, String),
}

impl BindMount {
    pub fn host(&self) -> &str {
        match self {
            BindMount::Path(p) => p,
            BindMount::Pair(host, _) => host,
        }
    }

    pub fn container(&self) -> &str {
        match self {
            BindMount::Path(p) => p,
            BindMount::Pair(_, container) => container,
        }
    }
}

// ---------------------------------------------------------------------------
// DoneLatch
// ---------------------------------------------------------------------------

/// Process-local completion signal shared by every clone of a record.
///
/// Fired when a merge observes the wire `done` marker, so callers that
/// hold a clone from `schedule()` can await completion without polling.
/// Never serialized.
#[derive(Debug, Clone, Default)]
pub struct DoneLatch(CancellationToken);

impl DoneLatch {
    /// Fire the latch. Idempotent.
    pub fn set(&self) {
        self.0.cancel();
    }

    pub fn is_set(&self) -> bool {
        self.0.is_cancelled()
    }

    /// Wait until the latch fires. Returns immediately if already fired.
    pub async fn wait(&self) {
        self.0.cancelled().await;
    }
}

// ---------------------------------------------------------------------------
// JobRecord
// ---------------------------------------------------------------------------

/// One schedulable unit of work and its lifecycle.
///
/// Created by a producer as a config, given identity and `Scheduled`
/// status by the coordinator, mutated by exactly one worker over its
/// run, and frozen once terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    /// Coordinator-assigned, globally unique, sortable-by-time id.
    pub job_id: String,

    /// Kind tag + kind-specific payload (`type` / `config` on the wire).
    #[serde(flatten)]
    pub config: JobConfig,

    pub status: JobStatus,

    /// Set exactly once each, in this order.
    pub scheduled_at: Option<DateTime<Utc>>,
    pub run_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,

    /// Fraction in `[0, 1]`; only meaningful while running.
    pub progress: Option<f64>,

    /// Formatted error chain; set only on failure.
    pub error: Option<String>,

    /// Kind-specific output; set only on success.
    pub output: Option<String>,

    /// Wire marker for terminal completion; lets a deserializer holding
    /// a local [`DoneLatch`] fire it.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub done: bool,

    #[serde(skip)]
    latch: DoneLatch,
}

impl JobRecord {
    /// Create a freshly scheduled record. The id comes from the
    /// coordinator; workers never assign identity.
    pub fn new(job_id: impl Into<String>, config: JobConfig) -> Self {
        Self {
            job_id: job_id.into(),
            config,
            status: JobStatus::Scheduled,
            scheduled_at: None,
            run_at: None,
            finished_at: None,
            progress: None,
            error: None,
            output: None,
            done: false,
            latch: DoneLatch::default(),
        }
    }

    /// Human-readable name: kind, salient config detail, id.
    pub fn job_name(&self) -> String {
        match &self.config {
            JobConfig::Shell(_) => format!("shell-{}", self.job_id),
            JobConfig::Docker(c) => {
                format!("docker-{}-{}", image_basename(&c.image), self.job_id)
            }
            JobConfig::Callback(c) => format!("callback-{}-{}", c.name, self.job_id),
        }
    }

    /// Transition `Scheduled -> Running`. Worker-only.
    pub fn mark_running(&mut self) {
        self.status = JobStatus::Running;
        self.run_at = Some(Utc::now());
    }

    /// Transition `Running -> Successful`. Worker-only.
    pub fn mark_successful(&mut self, output: Option<String>) {
        self.status = JobStatus::Successful;
        self.finished_at = Some(Utc::now());
        self.output = output;
        self.done = true;
    }

    /// Transition `Running -> Failed`. Worker-only.
    pub fn mark_failed(&mut self, error: String) {
        self.status = JobStatus::Failed;
        self.finished_at = Some(Utc::now());
        self.error = Some(error);
        self.done = true;
    }

    /// Whether the shared latch has fired.
    pub fn is_done(&self) -> bool {
        self.latch.is_set()
    }

    /// Await the shared latch. Fired by whichever merge first observes
    /// the `done` marker.
    pub async fn wait_done(&self) {
        self.latch.wait().await;
    }

    /// Merge an incoming version of this record into `self` in place,
    /// preserving the local latch.
    ///
    /// A terminal record is frozen: a stale non-terminal update (e.g. a
    /// progress sync racing a terminal put on the network) is dropped
    /// wholesale. Otherwise the incoming status wins and optional fields
    /// only overwrite when present, which makes the merge idempotent.
    pub fn merge_from(&mut self, incoming: &JobRecord) {
        if self.status.is_terminal() && !incoming.status.is_terminal() {
            return;
        }

        self.status = incoming.status;
        if incoming.scheduled_at.is_some() {
            self.scheduled_at = incoming.scheduled_at;
        }
        if incoming.run_at.is_some() {
            self.run_at = incoming.run_at;
        }
        if incoming.finished_at.is_some() {
            self.finished_at = incoming.finished_at;
        }
        if incoming.progress.is_some() {
            self.progress = incoming.progress;
        }
        if incoming.error.is_some() {
            self.error = incoming.error.clone();
        }
        if incoming.output.is_some() {
            self.output = incoming.output.clone();
        }
        if incoming.done && !self.done {
            self.done = true;
        }
        if self.done {
            self.latch.set();
        }
    }

    /// Short descriptor for queue snapshots.
    pub fn descriptor(&self) -> JobDescriptor {
        JobDescriptor {
            job_id: self.job_id.clone(),
            job_name: self.job_name(),
            status: self.status,
            progress: self.progress,
        }
    }
}

/// Trailing image name without registry path or tag.
fn image_basename(image: &str) -> &str {
    let name = image.rsplit('/').next().unwrap_or(image);
    name.split(':').next().unwrap_or(name)
}

/// Compact per-job entry in a queue snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub job_id: String,
    pub job_name: String,
    pub status: JobStatus,
    pub progress: Option<f64>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
