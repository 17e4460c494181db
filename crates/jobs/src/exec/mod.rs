//! Kind-specific job executors.
//!
//! Each executor receives only the record's stored config plus the
//! job's output sink, so a record that crossed the wire as JSON runs
//! identically on a remote worker. Executors let every error propagate;
//! containment is the worker loop's job.

mod callback;
mod docker;
mod shell;

use std::sync::Arc;

use crate::capture::JobSink;
use crate::error::JobError;
use crate::record::{JobConfig, JobRecord};
use crate::registry::CallbackRegistry;

/// Run `record`'s payload to completion, returning its output value.
pub async fn execute(
    record: &JobRecord,
    sink: &Arc<JobSink>,
    registry: &CallbackRegistry,
) -> Result<Option<String>, JobError> {
    match &record.config {
        JobConfig::Shell(config) => shell::run(config, sink).await,
        JobConfig::Docker(config) => docker::run(config, &record.job_name(), sink).await,
        JobConfig::Callback(config) => callback::run(config, registry, sink).await,
    }
}

/// Take a piped child stream, which exists by construction.
fn take_stream<T>(stream: Option<T>, which: &'static str) -> Result<T, JobError> {
    stream.ok_or_else(|| {
        JobError::Io(std::io::Error::other(format!(
            "child {which} was not captured"
        )))
    })
}
