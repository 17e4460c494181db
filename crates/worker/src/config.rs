use std::path::PathBuf;

/// Worker-process configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Base URL of the coordinator, e.g. `http://lab-host:8100`.
    pub coordinator_url: String,
    /// Number of concurrent worker slots in this process (default: `2`).
    pub slots: usize,
    /// Directory for per-job working dirs and logs (default: `jobs`).
    pub jobs_dir: PathBuf,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var           | Default                 |
    /// |-------------------|-------------------------|
    /// | `COORDINATOR_URL` | `http://127.0.0.1:8100` |
    /// | `WORKER_SLOTS`    | `2`                     |
    /// | `JOBS_DIR`        | `jobs`                  |
    pub fn from_env() -> Self {
        let coordinator_url =
            std::env::var("COORDINATOR_URL").unwrap_or_else(|_| "http://127.0.0.1:8100".into());

        let slots: usize = std::env::var("WORKER_SLOTS")
            .unwrap_or_else(|_| "2".into())
            .parse()
            .expect("WORKER_SLOTS must be a valid usize");

        let jobs_dir = PathBuf::from(std::env::var("JOBS_DIR").unwrap_or_else(|_| "jobs".into()));

        Self {
            coordinator_url,
            slots,
            jobs_dir,
        }
    }
}
