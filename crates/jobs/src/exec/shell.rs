//! Shell command executor.

use std::process::Stdio;
use std::sync::Arc;

use tokio::process::Command;

use crate::capture::{JobSink, StreamLabel};
use crate::error::JobError;
use crate::record::ShellConfig;

use super::take_stream;

/// Run the command line under `bash -c`, streaming both pipes through
/// the sink. Output is the last captured stdout line.
pub async fn run(config: &ShellConfig, sink: &Arc<JobSink>) -> Result<Option<String>, JobError> {
    let mut child = Command::new("/bin/bash")
        .arg("-c")
        .arg(&config.cmd)
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

    let status = child.wait().await?;

    // Join the readers before returning so no trailing output is lost.
    let _ = out_reader.await;
    let _ = err_reader.await;

    if !status.success() {
        return Err(JobError::CommandFailed {
            cmd: config.cmd.clone(),
            code: status.code(),
        });
    }

    Ok(sink.last_stdout_line().await)
}
