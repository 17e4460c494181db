//! Container executor, driving the `docker` CLI.
//!
//! The container runs attached under the job's name so its streams flow
//! through the sink like any subprocess. The container is removed after
//! the run regardless of exit status; a leftover name would otherwise
//! block the next run of the same job id.

use std::process::Stdio;
use std::sync::Arc;

use tokio::process::Command;

use crate::capture::{JobSink, StreamLabel};
use crate::error::JobError;
use crate::record::DockerConfig;

use super::take_stream;

/// Run the image to completion. Output is the full captured stdout.
pub async fn run(
    config: &DockerConfig,
    job_name: &str,
    sink: &Arc<JobSink>,
) -> Result<Option<String>, JobError> {
    let mut command = Command::new("docker");
    command.arg("run").arg("--name").arg(job_name);
    for mount in &config.mounts {
        command
            .arg("-v")
            .arg(format!("{}:{}", mount.host(), mount.container()));
    }
    command.arg(&config.image).args(&config.args);

    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdout = take_stream(child.stdout.take(), "stdout")?;
    let stderr = take_stream(child.stderr.take(), "stderr")?;

    let out_reader = tokio::spawn({
        let sink = Arc::clone(sink);
        async move { sink.pipe(StreamLabel::Out, stdout).await }
    });
    let err_reader = tokio::spawn({
        let sink = Arc::clone(sink);
        async move { sink.pipe(StreamLabel::Err, stderr).await }
    });

    let status = child.wait().await;

    let _ = out_reader.await;
    let _ = err_reader.await;

    remove_container(job_name).await;

    let status = status?;
    if !status.success() {
        return Err(JobError::ContainerFailed {
            name: job_name.to_string(),
            code: status.code().unwrap_or(-1),
        });
    }

    Ok(Some(sink.stdout_text().await))
}

/// Best-effort cleanup of the named container.
async fn remove_container(name: &str) {
    let removed = Command::new("docker")
        .args(["rm", "-f", name])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    if let Err(e) = removed {
        tracing::warn!(container = name, error = %e, "Failed to remove container");
    }
}
