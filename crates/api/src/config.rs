use std::path::PathBuf;

/// Coordinator configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8100`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// Directory holding per-job working dirs and logs (default: `jobs`).
    /// Wiped and recreated on startup.
    pub jobs_dir: PathBuf,
    /// Number of coordinator-local worker slots (default: `5`).
    pub local_workers: usize,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var         | Default                 |
    /// |-----------------|-------------------------|
    /// | `HOST`          | `0.0.0.0`               |
    /// | `PORT`          | `8100`                  |
    /// | `CORS_ORIGINS`  | `http://localhost:5173` |
    /// | `JOBS_DIR`      | `jobs`                  |
    /// | `LOCAL_WORKERS` | `5`                     |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8100".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let jobs_dir = PathBuf::from(std::env::var("JOBS_DIR").unwrap_or_else(|_| "jobs".into()));

        let local_workers: usize = std::env::var("LOCAL_WORKERS")
            .unwrap_or_else(|_| "5".into())
            .parse()
            .expect("LOCAL_WORKERS must be a valid usize");

        Self {
            host,
            port,
            cors_origins,
            jobs_dir,
            local_workers,
        }
    }
}
