use crate::record::JobStatus;

/// Errors raised by the job framework.
///
/// Payload variants (`CommandFailed`, `ContainerFailed`, `UnknownCallback`,
/// `Callback`, `Io` during execution) are contained per-record by the worker
/// loop and land in the record's `error` field. Framework variants
/// (`UnknownQueue`, `NotFound`, `Serialization`, `Transport`) propagate and
/// terminate the affected component loudly.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// No queue exists for the given name.
    #[error("Unknown queue: {0}")]
    UnknownQueue(String),

    /// No record exists for the given job id. Callers should not ask
    /// about jobs they never observed.
    #[error("Job not found: {0}")]
    NotFound(String),

    /// The record's callback name has no entry in the registry.
    #[error("Unknown callback: {0}")]
    UnknownCallback(String),

    /// A shell command exited with a non-zero status.
    #[error("Command `{cmd}` exited with status {code:?}")]
    CommandFailed { cmd: String, code: Option<i32> },

    /// A container run exited with a non-zero status.
    #[error("Container {name} exited with status {code}")]
    ContainerFailed { name: String, code: i32 },

    /// A registered callback returned an error.
    #[error("Callback failed: {0}")]
    Callback(String),

    /// An awaited job finished in a non-successful terminal state.
    /// Carries the failed record's recorded error, if any.
    #[error("Job {job_id} finished {status}: {error}")]
    Unsuccessful {
        job_id: String,
        status: JobStatus,
        error: String,
    },

    /// An I/O failure (spawn, pipe, log sink).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record failed to serialize or deserialize.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An HTTP transport failure talking to the coordinator.
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Render an error with its full source chain, one cause per line.
///
/// Used to populate a failed record's `error` field so the dashboard
/// shows the whole story, not just the outermost message.
pub fn format_error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str("\ncaused by: ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
