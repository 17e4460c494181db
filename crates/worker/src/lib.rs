//! Streamlab remote worker.
//!
//! A standalone process that pulls scheduled jobs from the coordinator
//! over the HTTP polling protocol and runs them through the shared
//! worker loop. [`RemoteQueues`] is the HTTP implementation of the
//! queue contract; everything else (executors, output capture, the
//! loop itself) comes from `streamlab-jobs` unchanged.

pub mod config;
pub mod remote;

pub use config::WorkerConfig;
pub use remote::RemoteQueues;
