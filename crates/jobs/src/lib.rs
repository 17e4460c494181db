//! Streamlab job execution framework.
//!
//! A queue-based task scheduler for the experiment harness: producers
//! schedule units of work (shell commands, container runs, registered
//! callbacks) with the coordinator, and workers -- local tasks or remote
//! processes polling over HTTP -- pull them through the lifecycle
//! `scheduled -> running -> {successful | failed | cancelled}`.
//!
//! - [`record`] -- [`JobRecord`], [`JobStatus`], per-kind configs.
//! - [`store`] -- the coordinator's authoritative [`JobStore`].
//! - [`queues`] -- the [`JobQueues`] contract workers run against.
//! - [`worker`] -- the execution loop and [`WorkerPool`].
//! - [`exec`] -- the three kind-specific executors.
//! - [`capture`] -- per-job output capture and progress extraction.
//! - [`registry`] -- the named-callback table.
//!
//! The framework does not guarantee exactly-once execution, does not
//! persist queue state across coordinator restarts, and cannot cancel
//! a job mid-run (`cancelled` is reachable only before a job leaves the
//! scheduled queue).

pub mod capture;
pub mod error;
pub mod exec;
pub mod queues;
pub mod record;
pub mod registry;
pub mod store;
pub mod worker;

pub use capture::{JobSink, ProgressScanner, StreamLabel, STDOUTERR_LOG};
pub use error::JobError;
pub use queues::JobQueues;
pub use record::{
    BindMount, CallbackConfig, DockerConfig, JobConfig, JobDescriptor, JobRecord, JobStatus,
    ShellConfig,
};
pub use registry::{CallbackContext, CallbackRegistry};
pub use store::{JobStore, QueueSnapshot};
pub use worker::{Worker, WorkerPool};
