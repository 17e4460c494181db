//! Registry of named callbacks runnable as jobs.
//!
//! Remote workers only ever see a JSON config, so callback jobs address
//! code by name. The registry is a closed, statically enumerable table:
//! every eligible function is registered explicitly at process start,
//! and the name in the config is the only lookup key -- no reflection,
//! no late binding.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::capture::JobSink;
use crate::error::JobError;

/// Everything a callback receives: its arguments and the job's output
/// sink, passed explicitly so callback output takes the same capture
/// path as subprocess output.
pub struct CallbackContext {
    pub args: Vec<serde_json::Value>,
    pub kwargs: serde_json::Map<String, serde_json::Value>,
    pub sink: Arc<JobSink>,
}

/// Boxed future returned by a callback invocation.
pub type CallbackFuture = Pin<Box<dyn Future<Output = Result<Option<String>, JobError>> + Send>>;

/// A registered callback. Returns the job's output value, if any.
pub type CallbackFn = Arc<dyn Fn(CallbackContext) -> CallbackFuture + Send + Sync>;

/// Name -> callback table, populated once at startup and then shared
/// read-only behind an `Arc`.
#[derive(Default)]
pub struct CallbackRegistry {
    callbacks: HashMap<String, CallbackFn>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` under `name`. Re-registering a name replaces
    /// the previous entry.
    pub fn register<F, Fut>(&mut self, name: impl Into<String>, callback: F)
    where
        F: Fn(CallbackContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<String>, JobError>> + Send + 'static,
    {
        self.callbacks.insert(
            name.into(),
            Arc::new(move |ctx| Box::pin(callback(ctx)) as CallbackFuture),
        );
    }

    /// Look up a callback by name. Unknown names are a configuration
    /// error, raised immediately rather than silently dropped.
    pub fn find(&self, name: &str) -> Result<CallbackFn, JobError> {
        self.callbacks
            .get(name)
            .cloned()
            .ok_or_else(|| JobError::UnknownCallback(name.to_string()))
    }

    /// Registered names, sorted. Useful for startup logging and
    /// diagnosing `UnknownCallback` errors.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.callbacks.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}
