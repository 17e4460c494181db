//! Callback executor: name lookup in the registry, then invocation.

use std::sync::Arc;

use crate::capture::JobSink;
use crate::error::JobError;
use crate::record::CallbackConfig;
use crate::registry::{CallbackContext, CallbackRegistry};

/// Look the callback up by name and run it with the config's arguments.
pub async fn run(
    config: &CallbackConfig,
    registry: &CallbackRegistry,
    sink: &Arc<JobSink>,
) -> Result<Option<String>, JobError> {
    let callback = registry.find(&config.name)?;
    callback(CallbackContext {
        args: config.args.clone(),
        kwargs: config.kwargs.clone(),
        sink: Arc::clone(sink),
    })
    .await
}
