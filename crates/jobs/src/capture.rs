//! Per-job output capture and progress extraction.
//!
//! Several workers execute concurrently and their payloads all write to
//! console streams. Each job therefore gets its own [`JobSink`]: lines
//! are tagged with a stream label, appended to the job's private log
//! file, optionally echoed to the coordinator console for live tailing,
//! and scanned for progress markers. Executors receive the sink
//! explicitly -- there is no ambient redirection table keyed by thread
//! identity, so output can never be attributed to the wrong job.
//!
//! Payloads report progress by printing marker lines:
//!
//! ```text
//! MAX_PROGRESS = 240
//! PROGRESS = 120
//! ```
//!
//! (`JOB_`-prefixed spellings and `=` without spaces are accepted.)
//! Once both markers have been seen, `current / max` is pushed on the
//! sink's progress channel, which the worker forwards through the
//! throttled `sync_job` path.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, Mutex};

/// File name of the combined per-job log, under the job's directory.
pub const STDOUTERR_LOG: &str = "stdouterr.log";

static CURRENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:JOB_)?PROGRESS\s*=\s*([0-9]+(?:\.[0-9]+)?)\s*$").expect("valid regex")
});
static MAX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:JOB_)?MAX_PROGRESS\s*=\s*([0-9]+(?:\.[0-9]+)?)\s*$").expect("valid regex")
});

// ---------------------------------------------------------------------------
// StreamLabel
// ---------------------------------------------------------------------------

/// Which console stream a captured line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamLabel {
    Out,
    Err,
}

impl StreamLabel {
    /// Line prefix written to the log file.
    pub fn prefix(self) -> &'static str {
        match self {
            StreamLabel::Out => "OUT ",
            StreamLabel::Err => "ERR ",
        }
    }
}

// ---------------------------------------------------------------------------
// ProgressScanner
// ---------------------------------------------------------------------------

/// Scans captured lines for progress markers.
///
/// Emits a new fraction only when both markers have been observed and
/// the computed value changed, so repeated identical markers do not
/// flood the sync channel.
#[derive(Debug, Default)]
pub struct ProgressScanner {
    current: Option<f64>,
    max: Option<f64>,
    last_emitted: Option<f64>,
}

impl ProgressScanner {
    pub fn observe(&mut self, line: &str) -> Option<f64> {
        if let Some(captures) = MAX_RE.captures(line) {
            self.max = captures[1].parse().ok();
        } else if let Some(captures) = CURRENT_RE.captures(line) {
            self.current = captures[1].parse().ok();
        } else {
            return None;
        }

        let (current, max) = (self.current?, self.max?);
        if max <= 0.0 {
            return None;
        }
        let fraction = (current / max).clamp(0.0, 1.0);
        if self.last_emitted == Some(fraction) {
            return None;
        }
        self.last_emitted = Some(fraction);
        Some(fraction)
    }
}

// ---------------------------------------------------------------------------
// JobSink
// ---------------------------------------------------------------------------

/// A job's private output sink: log file, stdout accumulator, progress
/// scanner, and console echo.
///
/// Shared as `Arc<JobSink>` between the executor's stream reader tasks;
/// line writes are serialized on the file lock so concurrent stdout and
/// stderr lines never interleave mid-line.
pub struct JobSink {
    job_name: String,
    path: PathBuf,
    file: Mutex<File>,
    stdout_lines: Mutex<Vec<String>>,
    scanner: Mutex<ProgressScanner>,
    progress_tx: Option<mpsc::UnboundedSender<f64>>,
}

impl JobSink {
    /// Create the log file at `path` (truncating any previous run) and
    /// return the sink. Progress fractions are sent on `progress_tx`
    /// when the payload emits marker lines.
    pub async fn create(
        path: impl Into<PathBuf>,
        job_name: impl Into<String>,
        progress_tx: Option<mpsc::UnboundedSender<f64>>,
    ) -> std::io::Result<Self> {
        let path = path.into();
        let file = File::create(&path).await?;
        Ok(Self {
            job_name: job_name.into(),
            path,
            file: Mutex::new(file),
            stdout_lines: Mutex::new(Vec::new()),
            scanner: Mutex::new(ProgressScanner::default()),
            progress_tx,
        })
    }

    /// Path of the log file this sink writes to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Capture one line: tag it, append it to the log, echo it, and
    /// scan it for progress markers.
    pub async fn write_line(&self, label: StreamLabel, line: &str) -> std::io::Result<()> {
        {
            let mut file = self.file.lock().await;
            file.write_all(label.prefix().as_bytes()).await?;
            file.write_all(line.as_bytes()).await?;
            file.write_all(b"\n").await?;
        }

        if label == StreamLabel::Out {
            self.stdout_lines.lock().await.push(line.to_string());
        }

        tracing::debug!(job = %self.job_name, "{}{}", label.prefix(), line);

        if let Some(fraction) = self.scanner.lock().await.observe(line) {
            if let Some(tx) = &self.progress_tx {
                let _ = tx.send(fraction);
            }
        }
        Ok(())
    }

    /// Drain `reader` line by line into the sink until end of stream.
    ///
    /// Run as a task per child stream; the executor joins these tasks
    /// after the child exits so no late output is lost.
    pub async fn pipe<R>(&self, label: StreamLabel, reader: R)
    where
        R: AsyncRead + Unpin,
    {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if let Err(e) = self.write_line(label, &line).await {
                        tracing::warn!(job = %self.job_name, error = %e, "Failed to write job log");
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(job = %self.job_name, error = %e, "Failed to read job output stream");
                    break;
                }
            }
        }
    }

    /// Last captured stdout line, if any (a shell job's output value).
    pub async fn last_stdout_line(&self) -> Option<String> {
        self.stdout_lines.lock().await.last().cloned()
    }

    /// Full captured stdout (a container job's output value).
    pub async fn stdout_text(&self) -> String {
        self.stdout_lines.lock().await.join("\n")
    }

    /// Flush the log file. Called by the worker before it loops.
    pub async fn flush(&self) -> std::io::Result<()> {
        self.file.lock().await.flush().await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
